//! End-to-end waterfall flow against sandbox networks.
//!
//! Runs a placement through the mediator, binds the chosen ad to a surface,
//! and drives impression and click signals the way a host view would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use mediation::ad::{AdHandle, AdListener, AdSignals, AdState, AdSurface};
use mediation::adapter::{AdapterRegistry, SandboxAdapter};
use mediation::assets::{AssetCacheCoordinator, AssetDownloader, AssetError, FetchSummary};
use mediation::context::{AppInfo, ConnectionType, DeviceInfo, RequestContext, Targeting};
use mediation::insight::{InsightRecord, InsightSink};
use mediation::mediator::Mediator;
use mediation::placement::{AdFormat, DeliveryRule, PlacementConfig, PriorityRule};
use mediation::waterfall::{WaterfallConfig, WaterfallSelector};
use mediation::{BoxFuture, WaterfallError};

const ICON: &str = "https://cdn.example.com/sandbox/icon.png";
const BANNER: &str = "https://cdn.example.com/sandbox/banner.jpg";

#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<(&'static str, InsightRecord)>>,
}

impl CollectingSink {
    fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == event)
            .count()
    }
}

impl InsightSink for CollectingSink {
    fn send_request(&self, record: &InsightRecord) {
        self.events.lock().unwrap().push(("request", record.clone()));
    }

    fn send_impression(&self, record: &InsightRecord) {
        self.events.lock().unwrap().push(("impression", record.clone()));
    }

    fn send_click(&self, record: &InsightRecord) {
        self.events.lock().unwrap().push(("click", record.clone()));
    }
}

/// Serves fixed bytes for known URLs.
struct StaticDownloader {
    files: HashMap<&'static str, &'static [u8]>,
}

impl AssetDownloader for StaticDownloader {
    fn download<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>> {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.files
                .get(url)
                .map(|data| Bytes::from_static(*data))
                .ok_or_else(|| AssetError::Status {
                    status: 404,
                    url: url.to_string(),
                })
        })
    }
}

/// Surface that keeps the signals it is bound with so the test can act as
/// the viewability tracker.
#[derive(Default)]
struct TestSurface {
    bound: Mutex<Option<AdSignals>>,
    unbinds: AtomicUsize,
}

impl TestSurface {
    fn impression(&self) {
        if let Some(signals) = self.bound.lock().unwrap().clone() {
            signals.impression();
        }
    }

    fn click(&self) {
        if let Some(signals) = self.bound.lock().unwrap().clone() {
            signals.click();
        }
    }

    fn is_bound(&self) -> bool {
        self.bound.lock().unwrap().is_some()
    }
}

impl AdSurface for TestSurface {
    fn id(&self) -> &str {
        "test-surface"
    }

    fn bind(&self, signals: AdSignals) {
        *self.bound.lock().unwrap() = Some(signals);
    }

    fn unbind(&self) {
        self.bound.lock().unwrap().take();
        self.unbinds.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Counts {
    impressions: AtomicUsize,
    clicks: AtomicUsize,
}

impl AdListener for Counts {
    fn on_impression_confirmed(&self, ad: &AdHandle) {
        assert_eq!(ad.state(), AdState::Tracking);
        self.impressions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_click(&self, _ad: &AdHandle) {
        self.clicks.fetch_add(1, Ordering::SeqCst);
    }

    fn on_assets_fetched(&self, _ad: &AdHandle, _summary: FetchSummary) {}
}

fn context() -> RequestContext {
    RequestContext::new(
        DeviceInfo {
            os_version: Some("14.2".into()),
            device_name: Some("Pixel".into()),
            user_uid: Some("uid-1".into()),
            connection: Some(ConnectionType::Cellular),
        },
        AppInfo {
            version: Some("2.4.0".into()),
            bundle_id: Some("com.example.reader".into()),
            sdk_version: Some("0.3.0".into()),
        },
    )
    .with_targeting(Targeting {
        age: Some(29),
        gender: Some("f".into()),
        ..Default::default()
    })
}

fn mediator(sink: Arc<CollectingSink>) -> Mediator {
    let registry = AdapterRegistry::new().with(Arc::new(SandboxAdapter::new()));
    let selector = WaterfallSelector::new(registry)
        .with_config(WaterfallConfig::default().with_load_timeout(Duration::from_millis(200)))
        .with_sink(sink);
    let downloader: Arc<dyn AssetDownloader> = Arc::new(StaticDownloader {
        files: HashMap::from([(ICON, b"icon-png".as_slice()), (BANNER, b"banner-jpg".as_slice())]),
    });
    Mediator::new(selector, AssetCacheCoordinator::new(downloader, Duration::from_secs(2)))
}

fn sandbox_rule(id: u32, outcome: &str) -> PriorityRule {
    PriorityRule::new(id, "sandbox").with_param("outcome", outcome)
}

#[tokio::test]
async fn test_full_waterfall_and_tracking_flow() {
    let sink = Arc::new(CollectingSink::default());
    let mediator = mediator(sink.clone());

    let placement = PlacementConfig::new("article_footer", AdFormat::Banner)
        .with_rule(sandbox_rule(1, "unreachable"))
        .with_rule(sandbox_rule(2, "no_fill").with_param("delay_ms", "10"))
        .with_rule(sandbox_rule(3, "slow").with_param("delay_ms", "x"))
        .with_rule(PriorityRule::new(4, "unknown_network"))
        .with_rule(
            sandbox_rule(5, "fill")
                .with_param("title", "Reader Pro")
                .with_param("icon_url", ICON)
                .with_param("banner_url", BANNER)
                .with_param("rating", "9/10"),
        )
        .with_delivery_rule(DeliveryRule {
            segment_ids: vec![7, 8],
        });

    let ad = mediator.request(&placement, &context()).await.unwrap();

    // Walk history.
    let insight = &ad.insight;
    assert_eq!(
        insight.attempted_networks,
        vec!["sandbox", "sandbox", "sandbox", "unknown_network", "sandbox"]
    );
    assert_eq!(insight.unreachable_networks, vec!["sandbox"]);
    assert_eq!(insight.network.as_deref(), Some("sandbox"));
    assert_eq!(insight.retry, 4);
    let rule_ids: Vec<u32> = insight.networks.iter().map(|n| n.priority_rule_id).collect();
    assert_eq!(rule_ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(insight.creative_url.as_deref(), Some(BANNER));
    assert_eq!(insight.delivery_segment_ids, vec![7, 8]);
    assert_eq!(insight.connection_type.as_deref(), Some("cellular"));
    assert_eq!(insight.age, Some(29));
    assert!(insight.generated_at.is_some());

    let document = insight.to_document().unwrap();
    assert_eq!(document["network"], "sandbox");
    assert_eq!(document["attempted_networks"].as_array().unwrap().len(), 5);
    assert_eq!(document["pub_app_bundle_id"], "com.example.reader");

    // Ready with assets.
    let handle = ad.handle.clone();
    assert!(handle.is_ready());
    assert_eq!(handle.title(), Some("Reader Pro"));
    assert!((handle.star_rating() - 4.5).abs() < 1e-5);
    assert_eq!(handle.icon(), Some(Bytes::from_static(b"icon-png")));
    assert_eq!(handle.banner(), Some(Bytes::from_static(b"banner-jpg")));
    assert_eq!(sink.count("request"), 1);

    // Tracking.
    let listener = Arc::new(Counts::default());
    handle.set_listener(listener.clone());
    let surface = Arc::new(TestSurface::default());
    handle.start_tracking(surface.clone()).unwrap();
    assert!(surface.is_bound());

    for _ in 0..5 {
        surface.impression();
    }
    surface.click();
    surface.click();

    assert_eq!(listener.impressions.load(Ordering::SeqCst), 1);
    assert_eq!(listener.clicks.load(Ordering::SeqCst), 2);
    assert_eq!(sink.count("impression"), 1);
    assert_eq!(sink.count("click"), 1);

    // Rebinding keeps the latches.
    handle.stop_tracking().unwrap();
    assert!(!surface.is_bound());
    handle.start_tracking(surface.clone()).unwrap();
    surface.impression();
    surface.click();
    assert_eq!(sink.count("impression"), 1);
    assert_eq!(sink.count("click"), 1);
    assert_eq!(listener.clicks.load(Ordering::SeqCst), 3);

    // Teardown.
    handle.destroy();
    assert_eq!(handle.state(), AdState::Destroyed);
    assert!(!surface.is_bound());
    assert!(handle.icon().is_none());
    handle.destroy();
    assert!(handle.start_tracking(surface.clone()).is_ok());
    assert!(!surface.is_bound());
}

#[tokio::test]
async fn test_exhausted_waterfall_reports_history() {
    let sink = Arc::new(CollectingSink::default());
    let mediator = mediator(sink.clone());

    let placement = PlacementConfig::new("launcher", AdFormat::Icon)
        .with_rule(sandbox_rule(1, "no_fill"))
        .with_rule(sandbox_rule(2, "error").with_param("error_code", "17"))
        .with_rule(sandbox_rule(3, "fill").with_param("delay_ms", "1000"));

    let err = mediator.request(&placement, &context()).await.unwrap_err();

    let insight = err.insight().unwrap();
    assert_eq!(insight.attempt_count(), 3);
    assert_eq!(insight.unreachable_networks, vec!["sandbox"]);
    assert_eq!(insight.network, None);
    assert_eq!(
        insight.networks[2].crash_report.as_ref().unwrap().error,
        "network_timeout"
    );
    assert!(matches!(err, WaterfallError::Exhausted { attempts: 3, .. }));
    assert_eq!(sink.count("request"), 1);
}

#[tokio::test]
async fn test_empty_placement_is_rejected_without_attempts() {
    let sink = Arc::new(CollectingSink::default());
    let mediator = mediator(sink.clone());

    let err = mediator
        .request(&PlacementConfig::new("empty", AdFormat::Banner), &context())
        .await
        .unwrap_err();

    assert!(matches!(err, WaterfallError::EmptyWaterfall(_)));
    assert!(err.insight().is_none());
    assert_eq!(sink.count("request"), 0);
}
