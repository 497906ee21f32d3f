//! Waterfall selection.
//!
//! A placement's priority rules are tried strictly one after another, in
//! index order. The first network that fills wins; every other outcome is
//! recorded and the walk moves on. Only two things are ever surfaced to the
//! caller as errors: a request that cannot start (missing placement data,
//! bad context, no rules) and a walk in which every rule failed.
//!
//! ```text
//! rule[0] ──fail──► rule[1] ──fail──► rule[2] ──fill──► AdHandle
//!    │                 │                 │
//!    └─────────────────┴─────────────────┴──► InsightRecorder
//! ```
//!
//! Loads never overlap: networks may start sessions or count requests as a
//! side effect of loading, so rule `n + 1` is only invoked after rule `n`
//! has answered or hit its deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ad::{AdHandle, NativeAd};
use crate::adapter::AdapterRegistry;
use crate::context::RequestContext;
use crate::error::{AdapterError, WaterfallError};
use crate::insight::{latency_millis, InsightRecord, InsightRecorder, InsightSink};
use crate::placement::{AdFormat, PlacementConfig, PriorityRule};

/// Default per-network load deadline in milliseconds.
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 5_000;

/// Waterfall tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterfallConfig {
    /// Deadline for a single network load. A network that misses it is
    /// recorded as unreachable and the walk advances.
    pub load_timeout: Duration,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
        }
    }
}

impl WaterfallConfig {
    pub fn with_load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }
}

/// A successful walk.
#[derive(Debug)]
pub struct Selection {
    pub handle: AdHandle,
    pub insight: InsightRecord,
}

/// Walks a placement's priority rules until one network fills.
pub struct WaterfallSelector {
    registry: AdapterRegistry,
    config: WaterfallConfig,
    sink: Option<Arc<dyn InsightSink>>,
}

impl std::fmt::Debug for WaterfallSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaterfallSelector")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl WaterfallSelector {
    pub fn new(registry: AdapterRegistry) -> Self {
        Self {
            registry,
            config: WaterfallConfig::default(),
            sink: None,
        }
    }

    pub fn with_config(mut self, config: WaterfallConfig) -> Self {
        self.config = config;
        self
    }

    /// Sink that chosen ads report their impression and click insight to.
    pub fn with_sink(mut self, sink: Arc<dyn InsightSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn config(&self) -> &WaterfallConfig {
        &self.config
    }

    pub fn sink(&self) -> Option<&Arc<dyn InsightSink>> {
        self.sink.as_ref()
    }

    /// Select an ad for `placement`.
    ///
    /// Returns the first network's ad wrapped in an [`AdHandle`] together
    /// with the walk's insight record. On exhaustion the error carries the
    /// full attempt history.
    pub async fn select_ad(
        &self,
        placement: &PlacementConfig,
        context: &RequestContext,
    ) -> Result<Selection, WaterfallError> {
        if placement.name().trim().is_empty() {
            return Err(WaterfallError::MissingData(
                "placement name is empty".to_string(),
            ));
        }
        context.validate().map_err(WaterfallError::IllegalArguments)?;
        if placement.priority_rules().is_empty() {
            tracing::warn!(placement = placement.name(), "Placement has no priority rules");
            return Err(WaterfallError::EmptyWaterfall(placement.name().to_string()));
        }

        let recorder = InsightRecorder::new();
        recorder.begin(placement, context);

        tracing::debug!(
            placement = placement.name(),
            rules = placement.priority_rules().len(),
            "Starting waterfall"
        );

        for (index, rule) in placement.priority_rules().iter().enumerate() {
            let (latency, result) = self.attempt(rule, context).await;
            let latency_ms = latency_millis(latency);

            match result {
                Ok(native) => {
                    recorder.add_attempt(rule, latency, None);
                    recorder.set_creative_url(creative_url(placement.ad_format(), native.as_ref()));
                    recorder.stamp_generated();

                    tracing::info!(
                        placement = placement.name(),
                        network = rule.network_code(),
                        rule_id = rule.id(),
                        position = index,
                        latency_ms,
                        "Network filled"
                    );

                    let handle = AdHandle::new(
                        rule.network_code(),
                        native,
                        recorder.snapshot(),
                        self.sink.clone(),
                    );
                    return Ok(Selection {
                        handle,
                        insight: recorder.take(),
                    });
                }
                Err(error) => {
                    tracing::debug!(
                        placement = placement.name(),
                        network = rule.network_code(),
                        rule_id = rule.id(),
                        position = index,
                        latency_ms,
                        kind = %error.kind(),
                        error = %error,
                        "Network failed, advancing"
                    );
                    recorder.add_attempt(rule, latency, Some(&error));
                }
            }
        }

        recorder.stamp_generated();
        let attempts = recorder.attempt_count();
        tracing::warn!(placement = placement.name(), attempts, "Waterfall exhausted");

        Err(WaterfallError::Exhausted {
            placement: placement.name().to_string(),
            attempts,
            insight: Box::new(recorder.take()),
        })
    }

    /// Resolve, validate and load one rule under the configured deadline.
    async fn attempt(
        &self,
        rule: &PriorityRule,
        context: &RequestContext,
    ) -> (Duration, Result<Box<dyn NativeAd>, AdapterError>) {
        let start = Instant::now();

        let adapter = match self.registry.get(rule.network_code()) {
            Some(adapter) => adapter,
            None => {
                return (
                    start.elapsed(),
                    Err(AdapterError::AdapterMissing(rule.network_code().to_string())),
                )
            }
        };

        if let Err(e) = adapter.validate(rule) {
            return (start.elapsed(), Err(e));
        }

        let timeout = self.config.load_timeout;
        let result = match tokio::time::timeout(timeout, adapter.load(rule, context)).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Timeout(timeout)),
        };
        (start.elapsed(), result)
    }
}

/// URL of the creative a placement of `format` displays.
fn creative_url(format: AdFormat, ad: &dyn NativeAd) -> Option<String> {
    let url = match format {
        AdFormat::Icon => ad.icon_url(),
        AdFormat::Banner | AdFormat::Video => ad.banner_url(),
    };
    url.filter(|u| !u.is_empty()).map(String::from)
}
