//! Asset pre-fetch for chosen ads.
//!
//! Before an ad is handed to the host, its remote images are downloaded so
//! the host can render without further network round-trips. A fixed set of
//! slots (icon, banner) is fetched concurrently; one completion is reported
//! after every slot has resolved, whether it succeeded, failed, or had no
//! URL to begin with.
//!
//! ```text
//!              ┌── icon   ── download ──┐
//! fetch() ─────┤                        ├──► CompletionBarrier ──► FetchSummary
//!              └── banner ── download ──┘
//! ```

mod barrier;
mod http;

pub use barrier::CompletionBarrier;
pub use http::{ReqwestDownloader, DEFAULT_DOWNLOAD_TIMEOUT_SECS};

#[cfg(test)]
pub use http::tests::MockDownloader;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::BoxFuture;

/// Errors from a single asset download.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssetError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("timed out fetching {0}")]
    Timeout(String),
}

/// Single-URL fetch primitive.
pub trait AssetDownloader: Send + Sync {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>>;
}

/// Number of cacheable asset slots per ad.
pub const ASSET_SLOT_COUNT: usize = 2;

/// Cacheable asset slots of a native ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetSlot {
    Icon,
    Banner,
}

impl AssetSlot {
    /// Every slot, in fetch-issue order.
    pub const ALL: [AssetSlot; ASSET_SLOT_COUNT] = [AssetSlot::Icon, AssetSlot::Banner];

    pub fn name(&self) -> &'static str {
        match self {
            AssetSlot::Icon => "icon",
            AssetSlot::Banner => "banner",
        }
    }
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome counts of one fetch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub fetched: usize,
    pub failed: usize,
    /// Slots with no URL.
    pub skipped: usize,
}

impl FetchSummary {
    pub fn total(&self) -> usize {
        self.fetched + self.failed + self.skipped
    }
}

/// Downloaded assets keyed by URL.
///
/// Once closed, inserts are dropped and lookups return nothing. Closing is
/// how a destroyed ad refuses downloads that land after teardown.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: DashMap<String, Bytes>,
    closed: AtomicBool,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a downloaded asset. Returns `false` if the store is closed or
    /// the URL is empty.
    pub fn insert(&self, url: &str, data: Bytes) -> bool {
        if url.is_empty() || self.is_closed() {
            return false;
        }
        self.assets.insert(url.to_string(), data);
        // close() may have cleared the map between the check and the insert.
        if self.is_closed() {
            self.assets.remove(url);
            return false;
        }
        true
    }

    pub fn get(&self, url: &str) -> Option<Bytes> {
        if self.is_closed() {
            return None;
        }
        self.assets.get(url).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Drop every asset and refuse further inserts.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.assets.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct FetchCounters {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl FetchCounters {
    fn summary(&self) -> FetchSummary {
        FetchSummary {
            fetched: self.fetched.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
            skipped: self.skipped.load(Ordering::Acquire),
        }
    }
}

/// Fetches every asset slot of an ad concurrently.
#[derive(Clone)]
pub struct AssetCacheCoordinator {
    downloader: Arc<dyn AssetDownloader>,
    timeout: Duration,
}

impl fmt::Debug for AssetCacheCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCacheCoordinator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AssetCacheCoordinator {
    pub fn new(downloader: Arc<dyn AssetDownloader>, timeout: Duration) -> Self {
        Self {
            downloader,
            timeout,
        }
    }

    /// Fetch every slot into `store` and wait for all of them to resolve.
    ///
    /// `urls` holds one entry per [`AssetSlot::ALL`] element; `None` or an
    /// empty string resolves that slot immediately. Failed downloads store
    /// nothing. Must be called within a tokio runtime.
    pub async fn fetch(
        &self,
        urls: [(AssetSlot, Option<String>); ASSET_SLOT_COUNT],
        store: Arc<AssetStore>,
    ) -> FetchSummary {
        let counters = Arc::new(FetchCounters::default());
        let (done_tx, done_rx) = oneshot::channel();
        let barrier = Arc::new(CompletionBarrier::new(urls.len(), move || {
            let _ = done_tx.send(());
        }));

        for (slot, url) in urls {
            let url = match url.filter(|u| !u.is_empty()) {
                Some(url) => url,
                None => {
                    tracing::trace!(%slot, "No asset URL, slot resolved");
                    counters.skipped.fetch_add(1, Ordering::AcqRel);
                    barrier.arrive();
                    continue;
                }
            };

            let downloader = Arc::clone(&self.downloader);
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let counters = Arc::clone(&counters);
            let timeout = self.timeout;

            tokio::spawn(async move {
                let result = match tokio::time::timeout(timeout, downloader.download(&url)).await {
                    Ok(result) => result,
                    Err(_) => Err(AssetError::Timeout(url.clone())),
                };

                match result {
                    Ok(data) => {
                        tracing::debug!(%slot, url = %url, bytes = data.len(), "Asset cached");
                        store.insert(&url, data);
                        counters.fetched.fetch_add(1, Ordering::AcqRel);
                    }
                    Err(e) => {
                        tracing::warn!(%slot, url = %url, error = %e, "Asset download failed");
                        counters.failed.fetch_add(1, Ordering::AcqRel);
                    }
                }
                barrier.arrive();
            });
        }

        // Only the download tasks may keep the completion sender alive.
        drop(barrier);
        if done_rx.await.is_err() {
            // A download task died before arriving; report what resolved.
            tracing::error!("Asset fetch task aborted before completion");
        }

        counters.summary()
    }
}
