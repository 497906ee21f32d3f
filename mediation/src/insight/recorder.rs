//! Serialized accumulation of one walk's insight record.
//!
//! The recorder is the single writer for an [`InsightRecord`]. Every
//! mutation happens under one lock, so "append attempt" is atomic with
//! respect to concurrent observers and a snapshot can never interleave with
//! a reset.

use std::time::Duration;

use parking_lot::Mutex;

use crate::context::RequestContext;
use crate::error::AdapterError;
use crate::placement::{PlacementConfig, PriorityRule};

use super::record::{CrashReport, InsightRecord};

/// Whole milliseconds in `latency`, saturating at `u64::MAX`.
pub fn latency_millis(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}

/// Accumulates attempts for one placement walk.
#[derive(Debug, Default)]
pub struct InsightRecorder {
    record: Mutex<InsightRecord>,
}

impl InsightRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a walk: clear the previous walk and snapshot placement data.
    pub fn begin(&self, placement: &PlacementConfig, context: &RequestContext) {
        let mut record = self.record.lock();
        record.reset();
        record.fill_context(context);
        record.placement_name = Some(placement.name().to_string());
        record.ad_format_code = Some(placement.ad_format().code().to_string());
        record.delivery_segment_ids = placement.delivery_rule().segment_ids.clone();
    }

    /// Populate the static context fields of the current walk.
    pub fn fill_context(&self, context: &RequestContext) {
        self.record.lock().fill_context(context);
    }

    /// Record one provider attempt.
    ///
    /// With no error the rule's network becomes the chosen network. With an
    /// error the network is listed as attempted (and unreachable for
    /// transport failures) and the retry counter advances.
    pub fn add_attempt(&self, rule: &PriorityRule, latency: Duration, error: Option<&AdapterError>) {
        let code = rule.network_code();
        let latency_ms = latency_millis(latency);

        let mut record = self.record.lock();
        record.add_network(rule, latency_ms, error.map(CrashReport::from));
        record.add_attempted_network(code);

        match error {
            None => {
                record.network = Some(code.to_string());
            }
            Some(err) => {
                if err.kind().is_unreachable() {
                    record.add_unreachable_network(code);
                }
                record.retry += 1;
                record.retry_error = Some(err.to_string());
            }
        }
    }

    pub fn set_creative_url(&self, url: Option<String>) {
        self.record.lock().creative_url = url;
    }

    /// Stamp the completion time of the walk.
    pub fn stamp_generated(&self) {
        self.record.lock().generated_at = Some(chrono::Utc::now().timestamp_millis());
    }

    pub fn attempt_count(&self) -> usize {
        self.record.lock().attempt_count()
    }

    /// Copy of the record as it stands now.
    pub fn snapshot(&self) -> InsightRecord {
        self.record.lock().clone()
    }

    /// Hand the record out and leave the recorder empty for reuse.
    pub fn take(&self) -> InsightRecord {
        std::mem::take(&mut *self.record.lock())
    }

    pub fn reset(&self) {
        self.record.lock().reset();
    }
}
