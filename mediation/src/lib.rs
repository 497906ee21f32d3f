//! Mediation - native ad waterfall engine
//!
//! This library picks one ad for a placement by trying ad networks in
//! priority order, records a diagnostic insight of every attempt, pre-fetches
//! the chosen ad's images, and tracks impressions and clicks on the result
//! with at-most-once reporting.
//!
//! ```ignore
//! use std::sync::Arc;
//! use mediation::config::ConfigFile;
//! use mediation::insight::LoggingSink;
//! use mediation::mediator::Mediator;
//! use mediation::placement::{AdFormat, PlacementConfig, PriorityRule};
//!
//! let mediator = Mediator::from_config_file(&ConfigFile::load()?, Arc::new(LoggingSink))?;
//! let placement = PlacementConfig::new("home_feed", AdFormat::Banner)
//!     .with_rule(PriorityRule::new(1, "sandbox").with_param("outcome", "fill"));
//! let ad = mediator.request(&placement, &context).await?;
//! ad.handle.start_tracking(surface)?;
//! ```

pub mod ad;
pub mod adapter;
pub mod assets;
pub mod config;
pub mod context;
pub mod error;
pub mod insight;
pub mod logging;
pub mod mediator;
pub mod placement;
pub mod waterfall;

/// Boxed future used by the dyn-compatible async traits of this crate.
pub use futures::future::BoxFuture;

pub use ad::{AdHandle, AdListener, AdSignals, AdState, AdSurface, NativeAd};
pub use adapter::{AdapterRegistry, NetworkAdapter};
pub use context::RequestContext;
pub use error::{AdapterError, FailureKind, WaterfallError};
pub use insight::{InsightRecord, InsightSink};
pub use mediator::{MediatedAd, Mediator};
pub use placement::{AdFormat, PlacementConfig, PriorityRule};
pub use waterfall::{WaterfallConfig, WaterfallSelector};
