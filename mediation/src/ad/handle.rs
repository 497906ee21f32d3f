//! Provider-agnostic handle around a loaded ad.
//!
//! The handle owns the provider's [`NativeAd`] exclusively and enforces,
//! once and centrally, the guarantees every provider needs:
//!
//! - at most one impression notification per handle lifetime
//! - click listener on every click, click insight only on the first
//! - nothing happens after `destroy`, even when provider callbacks are
//!   still queued
//!
//! Provider callbacks reach the handle through [`AdSignals`], a weak
//! reference that silently stops working once the handle is gone.

use std::fmt;
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use super::latch::OneShotLatch;
use super::native::{AdContent, AdSurface, Disclosure, NativeAd};
use super::state::{AdState, LifecycleError};
use crate::assets::{AssetCacheCoordinator, AssetSlot, AssetStore, FetchSummary};
use crate::insight::{InsightRecord, InsightSink};

/// Callbacks for events on a chosen ad.
pub trait AdListener: Send + Sync {
    /// First confirmed impression. Called at most once per handle.
    fn on_impression_confirmed(&self, ad: &AdHandle);

    /// Every click the provider reports while tracking.
    fn on_click(&self, ad: &AdHandle);

    /// Asset pre-fetch finished. Not called if the ad was destroyed first.
    fn on_assets_fetched(&self, _ad: &AdHandle, _summary: FetchSummary) {}
}

/// Result of [`AdHandle::fetch_assets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Every slot resolved and the ad is ready.
    Completed(FetchSummary),
    /// The ad was destroyed before or during the fetch.
    Discarded(FetchSummary),
}

impl FetchOutcome {
    pub fn summary(&self) -> FetchSummary {
        match self {
            FetchOutcome::Completed(s) | FetchOutcome::Discarded(s) => *s,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, FetchOutcome::Completed(_))
    }
}

/// Provider event routed through [`AdSignals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Impression,
    Click,
}

/// Signals raised while the provider ad is locked.
#[derive(Default)]
struct Deferred {
    depth: usize,
    queued: Vec<Signal>,
}

struct Shared {
    network_code: String,
    content: AdContent,
    state: Mutex<AdState>,
    native: Mutex<Option<Box<dyn NativeAd>>>,
    deferred: Mutex<Deferred>,
    impression: OneShotLatch,
    click: OneShotLatch,
    listener: RwLock<Option<Arc<dyn AdListener>>>,
    insight: Mutex<InsightRecord>,
    sink: Option<Arc<dyn InsightSink>>,
    assets: Arc<AssetStore>,
}

/// Normalized handle around one provider ad.
///
/// Cloning is cheap and every clone refers to the same ad.
#[derive(Clone)]
pub struct AdHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for AdHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdHandle")
            .field("network", &self.shared.network_code)
            .field("state", &self.state())
            .field("impression_tracked", &self.impression_tracked())
            .field("click_tracked", &self.click_tracked())
            .finish_non_exhaustive()
    }
}

impl AdHandle {
    /// Wrap a provider ad.
    ///
    /// `insight` is the record of the walk that chose this ad; it is sent
    /// to `sink` on the first impression and the first click.
    pub fn new(
        network_code: impl Into<String>,
        native: Box<dyn NativeAd>,
        insight: InsightRecord,
        sink: Option<Arc<dyn InsightSink>>,
    ) -> Self {
        let content = AdContent::from_native(native.as_ref());
        Self {
            shared: Arc::new(Shared {
                network_code: network_code.into(),
                content,
                state: Mutex::new(AdState::Created),
                native: Mutex::new(Some(native)),
                deferred: Mutex::new(Deferred::default()),
                impression: OneShotLatch::new(),
                click: OneShotLatch::new(),
                listener: RwLock::new(None),
                insight: Mutex::new(insight),
                sink,
                assets: Arc::new(AssetStore::new()),
            }),
        }
    }

    // ---------------------------------------------------------------------
    // Read surface
    // ---------------------------------------------------------------------

    pub fn network_code(&self) -> &str {
        &self.shared.network_code
    }

    pub fn content(&self) -> &AdContent {
        &self.shared.content
    }

    pub fn title(&self) -> Option<&str> {
        self.shared.content.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.shared.content.description.as_deref()
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.shared.content.icon_url.as_deref()
    }

    pub fn banner_url(&self) -> Option<&str> {
        self.shared.content.banner_url.as_deref()
    }

    pub fn call_to_action(&self) -> Option<&str> {
        self.shared.content.call_to_action.as_deref()
    }

    pub fn star_rating(&self) -> f32 {
        self.shared.content.star_rating
    }

    pub fn disclosure(&self) -> Option<&Disclosure> {
        self.shared.content.disclosure.as_ref()
    }

    /// Downloaded bytes for `url`, if it was fetched successfully.
    pub fn get_asset(&self, url: &str) -> Option<Bytes> {
        self.shared.assets.get(url)
    }

    pub fn icon(&self) -> Option<Bytes> {
        self.icon_url().and_then(|url| self.get_asset(url))
    }

    pub fn banner(&self) -> Option<Bytes> {
        self.banner_url().and_then(|url| self.get_asset(url))
    }

    // ---------------------------------------------------------------------
    // State
    // ---------------------------------------------------------------------

    pub fn state(&self) -> AdState {
        *self.shared.state.lock()
    }

    /// Whether the ad can be shown right now.
    pub fn is_ready(&self) -> bool {
        if !self.state().is_usable() {
            return false;
        }
        self.shared
            .native
            .lock()
            .as_ref()
            .is_some_and(|native| native.is_ready())
    }

    pub fn impression_tracked(&self) -> bool {
        self.shared.impression.is_set()
    }

    pub fn click_tracked(&self) -> bool {
        self.shared.click.is_set()
    }

    /// Copy of the insight record attached to this ad.
    pub fn insight(&self) -> InsightRecord {
        self.shared.insight.lock().clone()
    }

    pub fn set_listener(&self, listener: Arc<dyn AdListener>) {
        if self.state().is_destroyed() {
            return;
        }
        *self.shared.listener.write() = Some(listener);
    }

    fn listener(&self) -> Option<Arc<dyn AdListener>> {
        self.shared.listener.read().clone()
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Skip asset pre-fetch and move straight to `Ready`.
    pub fn mark_ready(&self) -> Result<(), LifecycleError> {
        let mut state = self.shared.state.lock();
        match *state {
            AdState::Created => {
                *state = AdState::Ready;
                Ok(())
            }
            AdState::Destroyed => Ok(()),
            current => Err(LifecycleError {
                operation: "mark ready",
                state: current,
            }),
        }
    }

    /// Download the icon and banner and wait until both slots resolve.
    ///
    /// Asset failures never fail the fetch. If the ad is destroyed while
    /// downloads are in flight, late downloads are discarded and the
    /// listener is not notified.
    pub async fn fetch_assets(
        &self,
        coordinator: &AssetCacheCoordinator,
    ) -> Result<FetchOutcome, LifecycleError> {
        {
            let mut state = self.shared.state.lock();
            if state.is_destroyed() {
                return Ok(FetchOutcome::Discarded(FetchSummary::default()));
            }
            if !state.can_fetch_assets() {
                return Err(LifecycleError {
                    operation: "fetch assets",
                    state: *state,
                });
            }
            *state = AdState::AssetsPending;
        }

        let content = &self.shared.content;
        let urls = [
            (AssetSlot::Icon, content.icon_url.clone()),
            (AssetSlot::Banner, content.banner_url.clone()),
        ];
        let summary = coordinator
            .fetch(urls, Arc::clone(&self.shared.assets))
            .await;

        {
            let mut state = self.shared.state.lock();
            if state.is_destroyed() {
                tracing::debug!(
                    network = %self.shared.network_code,
                    "Asset fetch finished after destroy, ignored"
                );
                return Ok(FetchOutcome::Discarded(summary));
            }
            *state = AdState::Ready;
        }

        tracing::debug!(
            network = %self.shared.network_code,
            fetched = summary.fetched,
            failed = summary.failed,
            skipped = summary.skipped,
            "Assets fetched"
        );
        if let Some(listener) = self.listener() {
            listener.on_assets_fetched(self, summary);
        }
        Ok(FetchOutcome::Completed(summary))
    }

    /// Bind the ad to a surface and arm impression/click signals.
    ///
    /// A no-op on a destroyed ad.
    pub fn start_tracking(&self, surface: Arc<dyn AdSurface>) -> Result<(), LifecycleError> {
        {
            let mut state = self.shared.state.lock();
            if state.is_destroyed() {
                tracing::debug!(network = %self.shared.network_code, "start_tracking after destroy ignored");
                return Ok(());
            }
            if !state.can_start_tracking() {
                return Err(LifecycleError {
                    operation: "start tracking",
                    state: *state,
                });
            }
            *state = AdState::Tracking;
        }

        tracing::debug!(
            network = %self.shared.network_code,
            surface = surface.id(),
            "Tracking started"
        );
        let signals = self.signals();
        self.with_native(|native| native.start_tracking(surface, signals));
        Ok(())
    }

    /// Disarm signals and detach from the surface.
    ///
    /// A no-op on a destroyed ad.
    pub fn stop_tracking(&self) -> Result<(), LifecycleError> {
        {
            let mut state = self.shared.state.lock();
            if state.is_destroyed() {
                return Ok(());
            }
            if !state.can_stop_tracking() {
                return Err(LifecycleError {
                    operation: "stop tracking",
                    state: *state,
                });
            }
            *state = AdState::Idle;
        }

        self.with_native(|native| native.stop_tracking());
        tracing::debug!(network = %self.shared.network_code, "Tracking stopped");
        Ok(())
    }

    /// Release the provider ad. Idempotent.
    pub fn destroy(&self) {
        let previous = {
            let mut state = self.shared.state.lock();
            if state.is_destroyed() {
                return;
            }
            std::mem::replace(&mut *state, AdState::Destroyed)
        };

        let native = self.shared.native.lock().take();
        if let Some(mut native) = native {
            if previous == AdState::Tracking {
                native.stop_tracking();
            }
            native.destroy();
        }
        self.shared.assets.close();
        *self.shared.listener.write() = None;
        tracing::debug!(network = %self.shared.network_code, from = %previous, "Ad destroyed");
    }

    // ---------------------------------------------------------------------
    // Provider signals
    // ---------------------------------------------------------------------

    pub(crate) fn signals(&self) -> AdSignals {
        AdSignals {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Call into the provider ad.
    ///
    /// Impression and click signals raised while the provider lock is held
    /// are queued and delivered after it is released, so listeners may call
    /// back into the handle.
    fn with_native(&self, f: impl FnOnce(&mut dyn NativeAd)) {
        self.shared.deferred.lock().depth += 1;
        {
            let mut native = self.shared.native.lock();
            if let Some(native) = native.as_mut() {
                f(native.as_mut());
            }
        }

        let queued = {
            let mut deferred = self.shared.deferred.lock();
            deferred.depth -= 1;
            if deferred.depth == 0 {
                std::mem::take(&mut deferred.queued)
            } else {
                Vec::new()
            }
        };
        for signal in queued {
            self.dispatch(signal);
        }
    }

    fn signal(&self, signal: Signal) {
        {
            let mut deferred = self.shared.deferred.lock();
            if deferred.depth > 0 {
                deferred.queued.push(signal);
                return;
            }
        }
        self.dispatch(signal);
    }

    fn dispatch(&self, signal: Signal) {
        match signal {
            Signal::Impression => self.confirm_impression(),
            Signal::Click => self.confirm_click(),
        }
    }

    /// Set `latch` if the ad is tracking. Checked under the state lock so a
    /// concurrent `destroy` either happens first and wins, or after.
    fn arm_latch(&self, latch: &OneShotLatch, event: &str) -> Option<bool> {
        let state = self.shared.state.lock();
        let current = *state;
        if current != AdState::Tracking {
            tracing::trace!(network = %self.shared.network_code, event, state = %current, "Signal while disarmed");
            return None;
        }
        Some(latch.try_set())
    }

    fn confirm_impression(&self) {
        if self.arm_latch(&self.shared.impression, "impression") != Some(true) {
            return;
        }

        tracing::info!(network = %self.shared.network_code, "Impression confirmed");
        if let Some(sink) = &self.shared.sink {
            sink.send_impression(&self.insight());
        }
        if let Some(listener) = self.listener() {
            listener.on_impression_confirmed(self);
        }
    }

    fn confirm_click(&self) {
        let Some(first) = self.arm_latch(&self.shared.click, "click") else {
            return;
        };

        if first {
            tracing::info!(network = %self.shared.network_code, "First click");
            if let Some(sink) = &self.shared.sink {
                sink.send_click(&self.insight());
            }
        }
        if let Some(listener) = self.listener() {
            listener.on_click(self);
        }
    }

    fn mark_video(&self, complete: bool) {
        if self.state().is_destroyed() {
            return;
        }
        let mut insight = self.shared.insight.lock();
        if complete {
            insight.video_complete = Some(true);
        } else {
            insight.video_start = Some(true);
        }
    }
}

/// Entry point for provider-originated events.
///
/// Handed to [`NativeAd::start_tracking`] and [`AdSurface::bind`]. Signals
/// may arrive from any thread, any number of times; the handle decides
/// what they mean. Once the handle is dropped, signals do nothing.
#[derive(Clone)]
pub struct AdSignals {
    shared: Weak<Shared>,
}

impl fmt::Debug for AdSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdSignals")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl AdSignals {
    fn handle(&self) -> Option<AdHandle> {
        self.shared.upgrade().map(|shared| AdHandle { shared })
    }

    /// Whether the handle still exists.
    pub fn is_attached(&self) -> bool {
        self.shared.strong_count() > 0
    }

    pub fn impression(&self) {
        if let Some(handle) = self.handle() {
            handle.signal(Signal::Impression);
        }
    }

    pub fn click(&self) {
        if let Some(handle) = self.handle() {
            handle.signal(Signal::Click);
        }
    }

    pub fn video_started(&self) {
        if let Some(handle) = self.handle() {
            handle.mark_video(false);
        }
    }

    pub fn video_completed(&self) {
        if let Some(handle) = self.handle() {
            handle.mark_video(true);
        }
    }
}
