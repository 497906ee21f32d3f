//! Ad handles.
//!
//! A provider adapter produces a [`NativeAd`]; the waterfall wraps it in an
//! [`AdHandle`], which is what the host sees. The handle normalizes the read
//! surface, owns the lifecycle, and deduplicates provider callbacks.

mod handle;
mod latch;
mod native;
pub mod rating;
mod state;

pub use handle::{AdHandle, AdListener, AdSignals, FetchOutcome};
pub use latch::OneShotLatch;
pub use native::{AdContent, AdSurface, Disclosure, NativeAd};
pub use state::{AdState, LifecycleError};

#[cfg(test)]
pub use handle::tests::{CountingListener, MockNativeAd, MockProbe, NullSurface};
