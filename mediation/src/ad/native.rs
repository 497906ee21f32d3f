//! Provider-side ad objects and the surfaces they are bound to.

use std::sync::Arc;

use super::handle::AdSignals;

/// Advertising disclosure shown on top of an ad (ad choices, sponsor label).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disclosure {
    pub label: String,
    pub link_url: Option<String>,
}

/// Display surface an ad is bound to while tracking.
///
/// Rendering happens in the host. A surface that measures viewability
/// itself reports impressions and taps through the [`AdSignals`] it is
/// bound with; ads whose provider SDK measures on its own may ignore the
/// binding.
pub trait AdSurface: Send + Sync {
    /// Stable identifier of the surface, for logging.
    fn id(&self) -> &str;

    /// Route the surface's impression and click reports to `signals`.
    fn bind(&self, signals: AdSignals);

    /// Stop reporting to the previously bound signals.
    fn unbind(&self);
}

/// One ad object loaded by a provider adapter.
///
/// Implementations translate a provider's native ad into this read surface
/// and forward the provider's impression/click callbacks into the
/// [`AdSignals`] handed to [`start_tracking`](Self::start_tracking).
/// The wrapping [`AdHandle`](super::AdHandle) is the only caller of
/// `destroy`.
pub trait NativeAd: Send {
    fn title(&self) -> Option<&str>;
    fn description(&self) -> Option<&str>;
    fn icon_url(&self) -> Option<&str>;
    fn banner_url(&self) -> Option<&str>;
    fn call_to_action(&self) -> Option<&str>;

    /// Rating on a five-star scale.
    fn star_rating(&self) -> f32;

    fn disclosure(&self) -> Option<Disclosure> {
        None
    }

    /// Whether the provider still considers the ad showable.
    fn is_ready(&self) -> bool {
        true
    }

    /// Arm the provider's impression/click callbacks for `surface`.
    fn start_tracking(&mut self, surface: Arc<dyn AdSurface>, signals: AdSignals);

    /// Disarm callbacks and detach from the surface.
    fn stop_tracking(&mut self);

    /// Release provider resources.
    fn destroy(&mut self);
}

/// Normalized, immutable copy of an ad's read surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    pub banner_url: Option<String>,
    pub call_to_action: Option<String>,
    pub star_rating: f32,
    pub disclosure: Option<Disclosure>,
}

impl AdContent {
    pub fn from_native(ad: &dyn NativeAd) -> Self {
        Self {
            title: ad.title().map(String::from),
            description: ad.description().map(String::from),
            icon_url: ad.icon_url().map(String::from),
            banner_url: ad.banner_url().map(String::from),
            call_to_action: ad.call_to_action().map(String::from),
            star_rating: ad.star_rating(),
            disclosure: ad.disclosure(),
        }
    }
}
