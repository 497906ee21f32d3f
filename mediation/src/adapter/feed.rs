//! JSON ad feed network.
//!
//! Requests one ad from an HTTP endpoint that answers with a JSON document:
//!
//! ```json
//! {
//!   "ads": [{
//!     "title": "Spring sale",
//!     "description": "Everything must go",
//!     "icon_url": "https://cdn.example.com/icon.png",
//!     "image_url": "https://cdn.example.com/banner.jpg",
//!     "cta": "Shop now",
//!     "rating": "7/10",
//!     "ad_choices": { "label": "AdChoices", "url": "https://example.com/why" }
//!   }]
//! }
//! ```
//!
//! An `"error": { "code": 12, "type": "QuotaExceeded" }` object reports a
//! provider-specific failure.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;

use crate::ad::{rating, AdSignals, AdSurface, Disclosure, NativeAd};
use crate::adapter::NetworkAdapter;
use crate::context::RequestContext;
use crate::error::AdapterError;
use crate::placement::PriorityRule;
use crate::BoxFuture;

const FEED_CODE: &str = "feed";

/// Native code reported when the feed answers with something unparseable.
const INVALID_RESPONSE_CODE: i64 = -2;

/// HTTP transport for the feed adapter.
///
/// Implementations report transport failures and non-success statuses as
/// [`AdapterError::Unreachable`].
pub trait FeedHttpClient: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Bytes, AdapterError>>;
}

/// Feed transport over reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestFeedClient {
    client: reqwest::Client,
}

impl ReqwestFeedClient {
    pub fn with_timeout(timeout: Duration) -> Result<Self, AdapterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AdapterError::IllegalArguments(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

impl FeedHttpClient for ReqwestFeedClient {
    fn get<'a>(
        &'a self,
        url: &'a str,
        query: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<Bytes, AdapterError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(|e| AdapterError::Unreachable(format!("Request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(AdapterError::Unreachable(format!(
                    "HTTP {} from {}",
                    response.status(),
                    url
                )));
            }

            response
                .bytes()
                .await
                .map_err(|e| AdapterError::Unreachable(format!("Failed to read response: {}", e)))
        })
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    ads: Vec<FeedAdPayload>,
    error: Option<FeedErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct FeedErrorPayload {
    code: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FeedAdPayload {
    title: Option<String>,
    description: Option<String>,
    icon_url: Option<String>,
    image_url: Option<String>,
    cta: Option<String>,
    rating: Option<String>,
    ad_choices: Option<AdChoicesPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct AdChoicesPayload {
    label: String,
    url: Option<String>,
}

/// Network backed by an HTTP JSON feed.
///
/// Rule parameters: `endpoint` and `app_token` (required), `slot`
/// (optional).
pub struct FeedAdapter<C: FeedHttpClient> {
    client: C,
}

impl<C: FeedHttpClient> FeedAdapter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn build_query(rule: &PriorityRule, context: &RequestContext) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |key: &str, value: Option<&str>| {
            if let Some(value) = value {
                query.push((key.to_string(), value.to_string()));
            }
        };

        push("app_token", rule.param("app_token"));
        push("slot", rule.param("slot"));
        push("bundle_id", context.app.bundle_id.as_deref());
        push("app_version", context.app.version.as_deref());
        push("os_version", context.device.os_version.as_deref());
        push("uid", context.device.user_uid.as_deref());
        push("connection", context.device.connection.map(|c| c.code()));

        if let Some(targeting) = &context.targeting {
            query.extend(targeting.to_params());
        }
        query
    }

    fn parse(body: &[u8]) -> Result<FeedAd, AdapterError> {
        let response: FeedResponse = serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "Unparseable feed response");
            AdapterError::unknown(INVALID_RESPONSE_CODE, "InvalidResponse")
        })?;

        if let Some(error) = response.error {
            return Err(AdapterError::unknown(error.code, error.kind));
        }

        response
            .ads
            .into_iter()
            .next()
            .map(FeedAd::from_payload)
            .ok_or(AdapterError::NoFill)
    }
}

impl<C: FeedHttpClient> NetworkAdapter for FeedAdapter<C> {
    fn code(&self) -> &str {
        FEED_CODE
    }

    fn required_params(&self) -> &[&'static str] {
        &["endpoint", "app_token"]
    }

    fn load<'a>(
        &'a self,
        rule: &'a PriorityRule,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<Box<dyn NativeAd>, AdapterError>> {
        Box::pin(async move {
            let endpoint = rule
                .param("endpoint")
                .ok_or_else(|| AdapterError::MissingData("feed endpoint".to_string()))?;
            let query = Self::build_query(rule, context);

            let body = self.client.get(endpoint, &query).await?;
            let ad = Self::parse(&body)?;
            Ok(Box::new(ad) as Box<dyn NativeAd>)
        })
    }
}

/// Ad served by a JSON feed.
pub struct FeedAd {
    payload: FeedAdPayload,
    rating: f32,
    surface: Option<Arc<dyn AdSurface>>,
}

impl FeedAd {
    fn from_payload(payload: FeedAdPayload) -> Self {
        let rating = payload
            .rating
            .as_deref()
            .and_then(rating::parse_fraction)
            .unwrap_or(0.0);
        Self {
            payload,
            rating,
            surface: None,
        }
    }
}

impl NativeAd for FeedAd {
    fn title(&self) -> Option<&str> {
        self.payload.title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.payload.description.as_deref()
    }

    fn icon_url(&self) -> Option<&str> {
        self.payload.icon_url.as_deref()
    }

    fn banner_url(&self) -> Option<&str> {
        self.payload.image_url.as_deref()
    }

    fn call_to_action(&self) -> Option<&str> {
        self.payload.cta.as_deref()
    }

    fn star_rating(&self) -> f32 {
        self.rating
    }

    fn disclosure(&self) -> Option<Disclosure> {
        self.payload.ad_choices.as_ref().map(|choices| Disclosure {
            label: choices.label.clone(),
            link_url: choices.url.clone(),
        })
    }

    fn start_tracking(&mut self, surface: Arc<dyn AdSurface>, signals: AdSignals) {
        surface.bind(signals);
        self.surface = Some(surface);
    }

    fn stop_tracking(&mut self) {
        if let Some(surface) = self.surface.take() {
            surface.unbind();
        }
    }

    fn destroy(&mut self) {
        self.stop_tracking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::context::{AppInfo, ConnectionType, DeviceInfo, Targeting};

    /// Mock feed transport returning a canned response.
    struct MockFeedClient {
        response: Result<Bytes, AdapterError>,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockFeedClient {
        fn new(response: Result<Bytes, AdapterError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn json(body: &'static str) -> Self {
            Self::new(Ok(Bytes::from_static(body.as_bytes())))
        }
    }

    impl FeedHttpClient for MockFeedClient {
        fn get<'a>(
            &'a self,
            url: &'a str,
            query: &'a [(String, String)],
        ) -> BoxFuture<'a, Result<Bytes, AdapterError>> {
            Box::pin(async move {
                self.requests.lock().push((url.to_string(), query.to_vec()));
                self.response.clone()
            })
        }
    }

    const FULL_AD: &str = r#"{
        "ads": [{
            "title": "Spring sale",
            "description": "Everything must go",
            "icon_url": "https://cdn.example.com/icon.png",
            "image_url": "https://cdn.example.com/banner.jpg",
            "cta": "Shop now",
            "rating": "3/5",
            "ad_choices": { "label": "AdChoices", "url": "https://example.com/why" }
        }]
    }"#;

    fn rule() -> PriorityRule {
        PriorityRule::new(11, FEED_CODE)
            .with_param("endpoint", "https://feed.example.com/v1/ads")
            .with_param("app_token", "tok-123")
    }

    fn context() -> RequestContext {
        RequestContext::new(
            DeviceInfo {
                os_version: Some("14".into()),
                connection: Some(ConnectionType::Wifi),
                ..Default::default()
            },
            AppInfo {
                bundle_id: Some("com.example.app".into()),
                ..Default::default()
            },
        )
        .with_targeting(Targeting {
            age: Some(31),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_load_maps_payload() {
        let adapter = FeedAdapter::new(MockFeedClient::json(FULL_AD));
        let ad = adapter.load(&rule(), &context()).await.unwrap();

        assert_eq!(ad.title(), Some("Spring sale"));
        assert_eq!(ad.banner_url(), Some("https://cdn.example.com/banner.jpg"));
        assert_eq!(ad.call_to_action(), Some("Shop now"));
        assert!((ad.star_rating() - 3.0).abs() < 1e-5);
        assert_eq!(ad.disclosure().unwrap().label, "AdChoices");
    }

    #[tokio::test]
    async fn test_request_carries_token_and_targeting() {
        let adapter = FeedAdapter::new(MockFeedClient::json(FULL_AD));
        adapter.load(&rule(), &context()).await.unwrap();

        let requests = adapter.client.requests.lock();
        let (url, query) = &requests[0];
        assert_eq!(url, "https://feed.example.com/v1/ads");
        assert!(query.contains(&("app_token".to_string(), "tok-123".to_string())));
        assert!(query.contains(&("connection".to_string(), "wifi".to_string())));
        assert!(query.contains(&("age".to_string(), "31".to_string())));
    }

    #[tokio::test]
    async fn test_empty_ads_is_no_fill() {
        let adapter = FeedAdapter::new(MockFeedClient::json(r#"{"ads": []}"#));
        let err = adapter.load(&rule(), &context()).await.err().unwrap();
        assert_eq!(err, AdapterError::NoFill);
    }

    #[tokio::test]
    async fn test_provider_error_is_unknown() {
        let adapter = FeedAdapter::new(MockFeedClient::json(
            r#"{"error": {"code": 12, "type": "QuotaExceeded"}}"#,
        ));
        let err = adapter.load(&rule(), &context()).await.err().unwrap();
        assert_eq!(err, AdapterError::unknown(12, "QuotaExceeded"));
    }

    #[tokio::test]
    async fn test_bad_json_is_unknown() {
        let adapter = FeedAdapter::new(MockFeedClient::json("<html>oops</html>"));
        let err = adapter.load(&rule(), &context()).await.err().unwrap();
        assert_eq!(err.kind(), crate::error::FailureKind::Unknown);
    }

    #[tokio::test]
    async fn test_transport_failure_passes_through() {
        let adapter = FeedAdapter::new(MockFeedClient::new(Err(AdapterError::Unreachable(
            "HTTP 503".into(),
        ))));
        let err = adapter.load(&rule(), &context()).await.err().unwrap();
        assert!(err.kind().is_unreachable());
    }

    #[test]
    fn test_requires_endpoint_and_token() {
        let adapter = FeedAdapter::new(MockFeedClient::json(FULL_AD));
        let rule = PriorityRule::new(11, FEED_CODE).with_param("endpoint", "https://x");
        assert!(matches!(adapter.validate(&rule), Err(AdapterError::MissingData(_))));
    }

    #[test]
    fn test_rating_uses_float_division() {
        let ad = FeedAd::from_payload(FeedAdPayload {
            title: None,
            description: None,
            icon_url: None,
            image_url: None,
            cta: None,
            rating: Some("7/10".into()),
            ad_choices: None,
        });
        assert!((ad.star_rating() - 3.5).abs() < 1e-5);
    }
}
