//! Caller-facing entry point.
//!
//! [`Mediator::request`] runs the waterfall for a placement and, when
//! pre-fetch is enabled, downloads the chosen ad's images before handing it
//! back, so the caller always receives an ad it can show immediately.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::ad::{AdHandle, AdListener, FetchOutcome};
use crate::adapter::AdapterRegistry;
use crate::assets::{AssetCacheCoordinator, AssetDownloader, AssetError, ReqwestDownloader};
use crate::config::ConfigFile;
use crate::context::RequestContext;
use crate::error::{AdapterError, WaterfallError};
use crate::insight::{InsightRecord, InsightSink};
use crate::placement::PlacementConfig;
use crate::waterfall::{Selection, WaterfallSelector};

/// Failure to assemble a mediator from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("adapter setup failed: {0}")]
    Adapter(#[from] AdapterError),

    #[error("asset downloader setup failed: {0}")]
    Assets(#[from] AssetError),
}

/// A chosen ad, ready to be shown, with the insight of the walk that chose it.
#[derive(Debug)]
pub struct MediatedAd {
    pub handle: AdHandle,
    pub insight: InsightRecord,
}

/// Waterfall selection plus asset pre-fetch.
pub struct Mediator {
    selector: WaterfallSelector,
    assets: AssetCacheCoordinator,
    prefetch: bool,
    listener: Option<Arc<dyn AdListener>>,
}

impl fmt::Debug for Mediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mediator")
            .field("selector", &self.selector)
            .field("assets", &self.assets)
            .field("prefetch", &self.prefetch)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Mediator {
    pub fn new(selector: WaterfallSelector, assets: AssetCacheCoordinator) -> Self {
        Self {
            selector,
            assets,
            prefetch: true,
            listener: None,
        }
    }

    pub fn with_prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Listener attached to every chosen ad before its assets are fetched.
    pub fn with_listener(mut self, listener: Arc<dyn AdListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Build a mediator with the built-in adapters and an HTTP downloader,
    /// tuned from `config`.
    pub fn from_config_file(
        config: &ConfigFile,
        sink: Arc<dyn InsightSink>,
    ) -> Result<Self, SetupError> {
        let download_timeout = Duration::from_secs(config.assets.download_timeout_secs);
        let registry = AdapterRegistry::with_defaults(config.to_waterfall_config().load_timeout)?;
        let selector = WaterfallSelector::new(registry)
            .with_config(config.to_waterfall_config())
            .with_sink(sink);

        let downloader: Arc<dyn AssetDownloader> =
            Arc::new(ReqwestDownloader::with_timeout(download_timeout)?);
        let assets = AssetCacheCoordinator::new(downloader, download_timeout);

        Ok(Self::new(selector, assets).with_prefetch(config.assets.prefetch))
    }

    pub fn selector(&self) -> &WaterfallSelector {
        &self.selector
    }

    pub fn prefetch_enabled(&self) -> bool {
        self.prefetch
    }

    /// Request an ad for `placement`.
    ///
    /// The walk's insight record is sent to the sink whether or not an ad
    /// was found. Asset download failures never fail the request.
    pub async fn request(
        &self,
        placement: &PlacementConfig,
        context: &RequestContext,
    ) -> Result<MediatedAd, WaterfallError> {
        let Selection { handle, insight } = match self.selector.select_ad(placement, context).await {
            Ok(selection) => selection,
            Err(e) => {
                if let (Some(sink), Some(record)) = (self.selector.sink(), e.insight()) {
                    sink.send_request(record);
                }
                return Err(e);
            }
        };

        if let Some(listener) = &self.listener {
            handle.set_listener(Arc::clone(listener));
        }

        if self.prefetch {
            match handle.fetch_assets(&self.assets).await {
                Ok(FetchOutcome::Completed(summary)) => {
                    tracing::debug!(
                        placement = placement.name(),
                        network = handle.network_code(),
                        fetched = summary.fetched,
                        failed = summary.failed,
                        "Assets pre-fetched"
                    );
                }
                Ok(FetchOutcome::Discarded(_)) => {
                    tracing::debug!(placement = placement.name(), "Ad destroyed during pre-fetch");
                }
                Err(e) => {
                    tracing::warn!(placement = placement.name(), error = %e, "Asset pre-fetch skipped");
                }
            }
        } else if let Err(e) = handle.mark_ready() {
            tracing::warn!(placement = placement.name(), error = %e, "Could not mark ad ready");
        }

        if let Some(sink) = self.selector.sink() {
            sink.send_request(&insight);
        }

        Ok(MediatedAd { handle, insight })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use std::sync::atomic::Ordering;

    use crate::ad::{AdState, CountingListener};
    use crate::adapter::tests::ScriptedAdapter;
    use crate::assets::MockDownloader;
    use crate::context::AppInfo;
    use crate::insight::tests::RecordingSink;
    use crate::placement::{AdFormat, PriorityRule};

    fn context() -> RequestContext {
        RequestContext {
            app: AppInfo {
                bundle_id: Some("com.example.app".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn mediator(adapter: ScriptedAdapter, mock: Arc<MockDownloader>) -> (Mediator, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let selector = WaterfallSelector::new(AdapterRegistry::new().with(Arc::new(adapter)))
            .with_sink(sink.clone());
        let downloader: Arc<dyn AssetDownloader> = mock;
        let assets = AssetCacheCoordinator::new(downloader, Duration::from_secs(5));
        (Mediator::new(selector, assets), sink)
    }

    fn placement() -> PlacementConfig {
        PlacementConfig::new("home_feed", AdFormat::Banner).with_rule(PriorityRule::new(0, "a"))
    }

    #[tokio::test]
    async fn test_request_prefetches_assets() {
        let mock = Arc::new(
            MockDownloader::default()
                .with("https://a.example.com/icon.png", Ok(Bytes::from_static(b"icon")))
                .with("https://a.example.com/banner.png", Ok(Bytes::from_static(b"banner"))),
        );
        let (mediator, sink) = mediator(ScriptedAdapter::filling("a"), mock.clone());

        let ad = mediator.request(&placement(), &context()).await.unwrap();

        assert_eq!(ad.handle.state(), AdState::Ready);
        assert!(ad.handle.is_ready());
        assert_eq!(ad.handle.icon(), Some(Bytes::from_static(b"icon")));
        assert_eq!(ad.handle.banner(), Some(Bytes::from_static(b"banner")));
        assert_eq!(mock.call_count(), 2);
        assert!(ad.insight.generated_at.is_some());
        assert_eq!(sink.count("request"), 1);
    }

    #[tokio::test]
    async fn test_asset_failures_do_not_fail_request() {
        let (mediator, _sink) = mediator(ScriptedAdapter::filling("a"), Arc::new(MockDownloader::default()));

        let ad = mediator.request(&placement(), &context()).await.unwrap();

        assert!(ad.handle.is_ready());
        assert!(ad.handle.icon().is_none());
    }

    #[tokio::test]
    async fn test_prefetch_disabled_skips_downloads() {
        let mock = Arc::new(MockDownloader::default());
        let (mediator, _sink) = mediator(ScriptedAdapter::filling("a"), mock.clone());
        let mediator = mediator.with_prefetch(false);

        let ad = mediator.request(&placement(), &context()).await.unwrap();

        assert_eq!(ad.handle.state(), AdState::Ready);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_still_reports_request() {
        let (mediator, sink) = mediator(
            ScriptedAdapter::failing("a", AdapterError::NoFill),
            Arc::new(MockDownloader::default()),
        );

        let err = mediator.request(&placement(), &context()).await.unwrap_err();

        assert!(matches!(err, WaterfallError::Exhausted { attempts: 1, .. }));
        assert_eq!(sink.count("request"), 1);
    }

    #[tokio::test]
    async fn test_listener_hears_prefetch_once() {
        let mock = Arc::new(
            MockDownloader::default().with("https://a.example.com/icon.png", Ok(Bytes::from_static(b"icon"))),
        );
        let listener = Arc::new(CountingListener::default());
        let (mediator, _sink) = mediator(ScriptedAdapter::filling("a"), mock);
        let mediator = mediator.with_listener(listener.clone());

        let ad = mediator.request(&placement(), &context()).await.unwrap();

        assert_eq!(listener.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(ad.handle.state(), AdState::Ready);
    }

    #[tokio::test]
    async fn test_returned_insight_matches_handle_insight() {
        let (mediator, sink) = mediator(ScriptedAdapter::filling("a"), Arc::new(MockDownloader::default()));

        let ad = mediator.request(&placement(), &context()).await.unwrap();

        assert!(ad.insight.generated_at.is_some());
        assert_eq!(ad.insight, ad.handle.insight());
        let sent = sink.events.lock()[0].1.clone();
        assert_eq!(sent.generated_at, ad.insight.generated_at);
    }

    #[test]
    fn test_from_config_file_defaults() {
        let sink: Arc<dyn InsightSink> = Arc::new(RecordingSink::default());
        let mediator = Mediator::from_config_file(&ConfigFile::default(), sink).unwrap();

        assert!(mediator.prefetch_enabled());
        assert_eq!(mediator.selector().registry().codes(), vec!["feed", "sandbox"]);
    }
}
