//! Diagnostic insight capture.
//!
//! One [`InsightRecord`] describes a full placement request: every provider
//! attempt in waterfall order, the chosen network, and a snapshot of the
//! device/app/user context. The [`InsightRecorder`] serializes mutation
//! during a walk; an [`InsightSink`] receives finished records for transport.
//!
//! ```text
//! WaterfallSelector ──add_attempt──► InsightRecorder ──take──► InsightRecord
//!                                                                  │
//!                         AdHandle (impression / click) ───────────┴──► InsightSink
//! ```

mod record;
mod recorder;

pub use record::{CrashReport, InsightRecord, NetworkAttempt};
pub use recorder::{latency_millis, InsightRecorder};

/// Transport boundary for finished insight records.
///
/// Implementations own delivery (HTTP, queueing, batching). Calls happen on
/// whatever task produced the event and must not block for long.
pub trait InsightSink: Send + Sync {
    /// A placement request finished (ad chosen or waterfall exhausted).
    fn send_request(&self, record: &InsightRecord);

    /// First confirmed impression of a chosen ad.
    fn send_impression(&self, record: &InsightRecord);

    /// First click on a chosen ad.
    fn send_click(&self, record: &InsightRecord);
}

/// Sink that writes each record to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl LoggingSink {
    fn emit(event: &str, record: &InsightRecord) {
        match record.to_json() {
            Ok(json) => tracing::info!(event, insight = %json, "Insight"),
            Err(e) => tracing::warn!(event, error = %e, "Failed to serialize insight"),
        }
    }
}

impl InsightSink for LoggingSink {
    fn send_request(&self, record: &InsightRecord) {
        Self::emit("request", record);
    }

    fn send_impression(&self, record: &InsightRecord) {
        Self::emit("impression", record);
    }

    fn send_click(&self, record: &InsightRecord) {
        Self::emit("click", record);
    }
}
