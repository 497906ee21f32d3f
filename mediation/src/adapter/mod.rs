//! Ad network adapter abstraction
//!
//! Each ad-serving network is one [`NetworkAdapter`] implementation. An
//! adapter turns a [`PriorityRule`] plus the request context into either a
//! loaded [`NativeAd`] or a typed [`AdapterError`]; the waterfall never sees
//! network-native types.
//!
//! Adapters are looked up by network code through an [`AdapterRegistry`]:
//!
//! ```ignore
//! use mediation::adapter::{AdapterRegistry, SandboxAdapter};
//! use std::sync::Arc;
//!
//! let mut registry = AdapterRegistry::new();
//! registry.register(Arc::new(SandboxAdapter::new()));
//! assert!(registry.get("sandbox").is_some());
//! ```

mod feed;
mod sandbox;

pub use feed::{FeedAd, FeedAdapter, FeedHttpClient, ReqwestFeedClient};
pub use sandbox::{SandboxAd, SandboxAdapter, SandboxOutcome};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::ad::NativeAd;
use crate::context::RequestContext;
use crate::error::AdapterError;
use crate::placement::PriorityRule;
use crate::BoxFuture;

/// One ad-serving network.
pub trait NetworkAdapter: Send + Sync {
    /// Network code matched against [`PriorityRule::network_code`].
    fn code(&self) -> &str;

    /// Rule parameters that must be present and non-blank.
    fn required_params(&self) -> &[&'static str] {
        &[]
    }

    /// Check a rule before any request is made.
    ///
    /// The waterfall calls this first and records the error without calling
    /// [`load`](Self::load) when it fails.
    fn validate(&self, rule: &PriorityRule) -> Result<(), AdapterError> {
        for key in self.required_params() {
            if rule.param(key).is_none() {
                return Err(AdapterError::MissingData(format!(
                    "{} rule {} requires parameter '{}'",
                    self.code(),
                    rule.id(),
                    key
                )));
            }
        }
        Ok(())
    }

    /// Request one ad.
    ///
    /// Called at most once per rule per walk, never concurrently with another
    /// load from the same walk.
    fn load<'a>(
        &'a self,
        rule: &'a PriorityRule,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Box<dyn NativeAd>, AdapterError>>;
}

/// Network code to adapter lookup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn NetworkAdapter>>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("codes", &self.codes())
            .finish()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in sandbox and feed adapters.
    pub fn with_defaults(feed_timeout: Duration) -> Result<Self, AdapterError> {
        let feed_client = ReqwestFeedClient::with_timeout(feed_timeout)?;
        let mut registry = Self::new();
        registry.register(Arc::new(SandboxAdapter::new()));
        registry.register(Arc::new(FeedAdapter::new(feed_client)));
        Ok(registry)
    }

    /// Register an adapter, replacing any previous one with the same code.
    pub fn register(&mut self, adapter: Arc<dyn NetworkAdapter>) {
        let code = adapter.code().to_string();
        if self.adapters.insert(code.clone(), adapter).is_some() {
            tracing::debug!(network = %code, "Replaced registered adapter");
        }
    }

    pub fn with(mut self, adapter: Arc<dyn NetworkAdapter>) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn NetworkAdapter>> {
        self.adapters.get(code).cloned()
    }

    /// Registered codes, sorted.
    pub fn codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
