// src/service/single.rs

use async_trait::async_trait;
use futures::future::{join_all, FutureExt};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, OnceCell};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::error::{AdsError, AdsResult};
use crate::model::actions::{ActionEvent, ActionKind};
use crate::model::placements::PlacementType;
use crate::model::registry::PlacementRegistry;
use crate::model::results::{AdsMessages, ShowResult};
use crate::provider::{AdHandle, LoadOutcome, NativeEvent, NativeEventKind, ProviderAdapter};
use crate::service::cache::PlacementCache;
use crate::service::events::ActionBus;
use crate::service::{AdsService, ServiceSettings};

/// Number of delivered results kept by [`SingleProviderAdsService::history`].
pub const HISTORY_LIMIT: usize = 100;

/// How long a closed rewarded ad waits for a reward callback that trails the close.
pub const LATE_REWARD_WINDOW: Duration = Duration::from_millis(500);

/// Uniform ads contract over exactly one [`ProviderAdapter`].
///
/// Owns the per-placement ad cache, the table of show calls waiting for a
/// provider callback and the service-wide "show in progress" flag. Native
/// events are consumed by a single pump task, which is the only place that
/// resolves pending shows.
pub struct SingleProviderAdsService {
    inner: Arc<Inner>,
}

struct Inner {
    adapter: Arc<dyn ProviderAdapter>,
    registry: Arc<PlacementRegistry>,
    settings: ServiceSettings,
    state: Mutex<ServiceState>,
    bus: ActionBus,
    lifetime: CancellationToken,
    initialized: OnceCell<bool>,
}

#[derive(Default)]
struct ServiceState {
    cache: PlacementCache,
    /// placement id -> caller waiting for that placement's outcome
    pending: HashMap<String, oneshot::Sender<ShowResult>>,
    active_placement: Option<String>,
    in_progress: bool,
    history: VecDeque<ShowResult>,
    disposed: bool,
}

/// Clears the in-progress flag however the show call ends.
struct ShowGuard<'a> {
    inner: &'a Inner,
}

impl<'a> ShowGuard<'a> {
    fn acquire(inner: &'a Inner, placement_id: &str) -> Option<Self> {
        let mut state = inner.state.lock();
        if state.in_progress {
            return None;
        }
        state.in_progress = true;
        state.active_placement = Some(placement_id.to_string());
        Some(Self { inner })
    }
}

impl Drop for ShowGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.in_progress = false;
        state.active_placement = None;
    }
}

impl SingleProviderAdsService {
    /// Must be called from within a tokio runtime.
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        registry: Arc<PlacementRegistry>,
        settings: ServiceSettings,
    ) -> Self {
        let inner = Arc::new(Inner {
            adapter,
            registry,
            settings,
            state: Mutex::new(ServiceState::default()),
            bus: ActionBus::new(),
            lifetime: CancellationToken::new(),
            initialized: OnceCell::new(),
        });

        if inner.settings.enable_ads {
            let (sink, events) = mpsc::unbounded_channel();
            inner.adapter.attach(sink);
            tokio::spawn(Inner::pump_native_events(inner.clone(), events));
        }

        info!(
            sdk = %inner.adapter.sdk_name(),
            platform = %inner.adapter.platform(),
            enabled = inner.settings.enable_ads,
            "ads service created"
        );
        Self { inner }
    }

    /// Loads (or joins the running load of) a rewarded placement.
    pub async fn load_rewarded(&self, placement_id: &str) -> bool {
        self.load_typed(placement_id, PlacementType::Rewarded).await
    }

    /// Loads (or joins the running load of) an interstitial placement.
    pub async fn load_interstitial(&self, placement_id: &str) -> bool {
        self.load_typed(placement_id, PlacementType::Interstitial).await
    }

    async fn load_typed(&self, placement_id: &str, kind: PlacementType) -> bool {
        match self.inner.registry.resolve(placement_id) {
            Ok(placement) if placement.placement_type == kind => self.inner.load(placement_id).await,
            Ok(placement) => {
                warn!(placement = placement_id, expected = %kind, actual = %placement.placement_type, "load with wrong placement type");
                false
            }
            Err(_) => false,
        }
    }

    /// Latest results delivered by this service, oldest first, at most [`HISTORY_LIMIT`].
    pub fn history(&self) -> Vec<ShowResult> {
        self.inner.state.lock().history.iter().cloned().collect()
    }

    pub fn is_in_progress(&self) -> bool {
        self.inner.state.lock().in_progress
    }

    pub fn active_placement(&self) -> Option<String> {
        self.inner.state.lock().active_placement.clone()
    }

    /// Cancelled when the service is disposed.
    pub fn lifetime(&self) -> CancellationToken {
        self.inner.lifetime.clone()
    }
}

impl Inner {
    fn sdk(&self) -> &str {
        self.adapter.sdk_name()
    }

    fn publish(&self, placement_id: &str, kind: PlacementType, action: ActionKind, message: &str) {
        self.bus.publish(ActionEvent::new(placement_id, kind, action, self.sdk()).with_message(message));
    }

    /// Placement ids of `kind` that this provider has a native id for.
    fn placement_ids(&self, kind: PlacementType) -> Vec<String> {
        let platform = self.adapter.platform();
        self.registry
            .by_type(kind)
            .filter(|p| p.native_id(platform).is_some())
            .map(|p| p.id.clone())
            .collect()
    }

    async fn ensure_initialized(&self) -> bool {
        *self
            .initialized
            .get_or_init(|| async {
                match self.adapter.initialize().await {
                    Ok(()) => {
                        info!(sdk = %self.sdk(), "ads sdk initialized");
                        true
                    }
                    Err(e) => {
                        error!(sdk = %self.sdk(), error = %e, "ads sdk initialization failed");
                        false
                    }
                }
            })
            .await
    }

    /// Single-flight load: concurrent callers for one placement share one provider load.
    ///
    /// The provider load runs on its own task, so it completes and fills the
    /// cache even when every caller stops waiting.
    async fn load(self: &Arc<Self>, placement_id: &str) -> bool {
        if !self.settings.enable_ads || self.lifetime.is_cancelled() {
            return false;
        }
        let Ok(placement) = self.registry.resolve(placement_id) else {
            debug!(placement = placement_id, "load for unknown placement");
            return false;
        };
        let kind = placement.placement_type;
        if kind == PlacementType::Banner {
            return false;
        }
        let Some(native_id) = placement.native_id(self.adapter.platform()) else {
            debug!(placement = placement_id, sdk = %self.sdk(), "placement has no native id for this provider");
            return false;
        };

        let flight = {
            let mut state = self.state.lock();
            if state.disposed {
                return false;
            }
            let entry = state.cache.entry(placement_id);
            if entry.handle.is_some() {
                return true;
            }
            match entry.in_flight.clone() {
                Some(flight) => flight,
                None => {
                    entry.attempted = true;
                    entry.last_load_started = Some(Instant::now());
                    let inner = self.clone();
                    let lifetime = self.lifetime.clone();
                    let run = Self::run_load(inner, placement_id.to_string(), native_id.to_string(), kind);
                    let task = tokio::spawn(async move {
                        tokio::select! {
                            loaded = run => loaded,
                            _ = lifetime.cancelled() => false,
                        }
                    });
                    let flight = async move { task.await.unwrap_or(false) }.boxed().shared();
                    entry.in_flight = Some(flight.clone());
                    flight
                }
            }
        };

        tokio::select! {
            loaded = flight => loaded,
            _ = self.lifetime.cancelled() => false,
        }
    }

    async fn run_load(self: Arc<Self>, placement_id: String, native_id: String, kind: PlacementType) -> bool {
        debug!(placement = %placement_id, native_id = %native_id, sdk = %self.sdk(), "loading ad");

        let outcome = if self.ensure_initialized().await {
            match kind {
                PlacementType::Rewarded => self.adapter.load_rewarded(&native_id).await,
                _ => self.adapter.load_interstitial(&native_id).await,
            }
        } else {
            LoadOutcome::Failed {
                code: -1,
                message: "sdk is not initialized".to_string(),
            }
        };

        let mut stale = None;
        let loaded = {
            let mut state = self.state.lock();
            if state.disposed {
                if let LoadOutcome::Loaded(handle) = &outcome {
                    stale = Some(*handle);
                }
                false
            } else {
                let entry = state.cache.entry(&placement_id);
                entry.in_flight = None;
                match &outcome {
                    LoadOutcome::Loaded(handle) => {
                        stale = state.cache.bind(&placement_id, *handle);
                        true
                    }
                    LoadOutcome::Failed { .. } => {
                        entry.available = false;
                        false
                    }
                }
            }
        };
        if let Some(handle) = stale {
            self.adapter.destroy(handle);
        }
        if self.lifetime.is_cancelled() {
            return false;
        }

        match outcome {
            LoadOutcome::Loaded(_) => {
                info!(placement = %placement_id, sdk = %self.sdk(), "ad loaded");
                self.publish(&placement_id, kind, ActionKind::Available, "");
            }
            LoadOutcome::Failed { code, message } => {
                warn!(placement = %placement_id, sdk = %self.sdk(), code, message = %message, "ad load failed");
                self.bus.publish(
                    ActionEvent::new(&placement_id, kind, ActionKind::Failed, self.sdk())
                        .with_message(message)
                        .with_error_code(code),
                );
                self.schedule_reload(&placement_id);
            }
        }
        loaded
    }

    /// Fire-and-forget reload, spaced at least `reload_interval` after the last load.
    fn schedule_reload(self: &Arc<Self>, placement_id: &str) {
        if !self.settings.enable_ads || self.lifetime.is_cancelled() {
            return;
        }
        let delay = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            let entry = state.cache.entry(placement_id);
            if entry.reload_scheduled || entry.load_in_progress() {
                return;
            }
            entry.reload_scheduled = true;
            entry.reload_delay(self.settings.reload_interval, Instant::now())
        };
        debug!(placement = placement_id, sdk = %self.sdk(), delay_ms = delay.as_millis() as u64, "reload scheduled");

        let inner = self.clone();
        let placement_id = placement_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {}
                _ = inner.lifetime.cancelled() => return,
            }
            inner.state.lock().cache.entry(&placement_id).reload_scheduled = false;
            inner.load(&placement_id).await;
        });
    }

    /// Checks everything a show needs; `Err` carries the result to hand back instead.
    async fn prepare_show(self: &Arc<Self>, placement_id: &str, kind: PlacementType) -> Result<AdHandle, ShowResult> {
        if !self.settings.enable_ads {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::ADS_DISABLED));
        }
        let Ok(placement) = self.registry.resolve(placement_id) else {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::PLACEMENT_NOT_FOUND));
        };
        if placement.placement_type != kind {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::PLACEMENT_TYPE_MISMATCH));
        }
        if placement.native_id(self.adapter.platform()).is_none() {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::PLACEMENT_UNAVAILABLE));
        }
        if kind == PlacementType::Banner {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::PLACEMENT_CAPPED));
        }

        if !self.load(placement_id).await {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::unavailable(kind)));
        }
        let handle = self.state.lock().cache.get(placement_id).and_then(|e| e.handle);
        let Some(handle) = handle else {
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::unavailable(kind)));
        };
        if !self.adapter.can_show(handle) {
            warn!(placement = placement_id, sdk = %self.sdk(), "cached ad can not be shown");
            self.consume(handle);
            return Err(ShowResult::failure(placement_id, kind, AdsMessages::PLACEMENT_CAPPED));
        }
        Ok(handle)
    }

    async fn await_show(
        &self,
        placement_id: &str,
        kind: PlacementType,
        handle: AdHandle,
        show_id: Uuid,
    ) -> AdsResult<ShowResult> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(AdsError::Cancelled);
            }
            state.pending.insert(placement_id.to_string(), tx);
        }

        debug!(%show_id, placement = placement_id, sdk = %self.sdk(), "dispatching native show");
        self.adapter.show(handle);

        tokio::select! {
            result = rx => result.map_err(|_| AdsError::Cancelled),
            _ = sleep(self.settings.show_timeout) => {
                self.state.lock().pending.remove(placement_id);
                warn!(%show_id, placement = placement_id, sdk = %self.sdk(), "provider never reported a show outcome");
                self.publish(placement_id, kind, ActionKind::Failed, AdsMessages::SHOW_TIMED_OUT);
                Ok(ShowResult::failure(placement_id, kind, AdsMessages::SHOW_TIMED_OUT))
            }
            _ = self.lifetime.cancelled() => Err(AdsError::Cancelled),
        }
    }

    /// Hands `result` to the caller waiting on `placement_id`. First result wins.
    fn resolve_show(&self, placement_id: &str, result: ShowResult) -> bool {
        let waiter = self.state.lock().pending.remove(placement_id);
        match waiter {
            Some(tx) => tx.send(result).is_ok(),
            None => {
                trace!(placement = placement_id, "no show waiting for this result");
                false
            }
        }
    }

    /// Ads are single use: drop the handle and queue a replacement.
    fn consume(self: &Arc<Self>, handle: AdHandle) {
        let owner = self.state.lock().cache.release(handle);
        self.destroy_and_reload(handle, owner);
    }

    /// Consumes a closed rewarded ad while still routing a trailing reward callback.
    fn consume_closed_rewarded(self: &Arc<Self>, handle: AdHandle) {
        let owner = self.state.lock().cache.retire(handle);
        self.destroy_and_reload(handle, owner);
    }

    fn destroy_and_reload(self: &Arc<Self>, handle: AdHandle, owner: Option<String>) {
        self.adapter.destroy(handle);
        if let Some(placement_id) = owner {
            self.schedule_reload(&placement_id);
        }
    }

    async fn pump_native_events(inner: Arc<Self>, mut events: mpsc::UnboundedReceiver<NativeEvent>) {
        loop {
            tokio::select! {
                _ = inner.lifetime.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => inner.handle_native_event(event),
                    None => break,
                },
            }
        }
        debug!(sdk = %inner.sdk(), "native event pump stopped");
    }

    fn handle_native_event(self: &Arc<Self>, event: NativeEvent) {
        let placement_id = {
            let state = self.state.lock();
            if state.disposed {
                return;
            }
            let late_reward = matches!(event.kind, NativeEventKind::Rewarded { .. });
            match state.cache.owner(event.handle) {
                Some(id) => id.to_string(),
                None => match state.cache.retired_owner(event.handle) {
                    Some(id) if late_reward => id.to_string(),
                    _ => {
                        trace!(sdk = %self.sdk(), handle = event.handle.0, "event for a released ad ignored");
                        return;
                    }
                },
            }
        };
        let kind = self
            .registry
            .resolve(&placement_id)
            .map(|p| p.placement_type)
            .unwrap_or(PlacementType::Rewarded);

        match event.kind {
            NativeEventKind::Clicked => {
                self.publish(&placement_id, kind, ActionKind::Clicked, "");
            }
            NativeEventKind::Paid { value_micros, currency } => {
                debug!(placement = %placement_id, sdk = %self.sdk(), value_micros, currency = %currency, "ad paid");
            }
            NativeEventKind::ImpressionRecorded => {
                debug!(placement = %placement_id, sdk = %self.sdk(), "ad impression recorded");
            }
            NativeEventKind::FullScreenOpened => {
                self.publish(&placement_id, kind, ActionKind::Opened, "");
            }
            NativeEventKind::Rewarded { reward_name, reward_amount } => {
                self.publish(&placement_id, kind, ActionKind::Rewarded, &reward_name);
                self.resolve_show(
                    &placement_id,
                    ShowResult::rewarded(&placement_id, &reward_name, reward_amount),
                );
            }
            NativeEventKind::FullScreenFailed { code, message } => {
                let message = if message.is_empty() {
                    AdsMessages::failed(kind).to_string()
                } else {
                    message
                };
                self.consume(event.handle);
                self.bus.publish(
                    ActionEvent::new(&placement_id, kind, ActionKind::Failed, self.sdk())
                        .with_message(message.clone())
                        .with_error_code(code),
                );
                self.resolve_show(&placement_id, ShowResult::failure(&placement_id, kind, message));
            }
            NativeEventKind::FullScreenClosed if kind == PlacementType::Rewarded => {
                self.consume_closed_rewarded(event.handle);
                self.publish(&placement_id, kind, ActionKind::Closed, "");
                self.settle_closed_rewarded(placement_id, event.handle);
            }
            NativeEventKind::FullScreenClosed => {
                self.consume(event.handle);
                self.publish(&placement_id, kind, ActionKind::Closed, "");
                self.resolve_show(
                    &placement_id,
                    ShowResult::completed(&placement_id, kind, AdsMessages::INTERSTITIAL_CLOSED),
                );
            }
        }
    }

    /// Some SDKs report the reward after the close. Give it a short window
    /// before answering the caller with a plain close.
    fn settle_closed_rewarded(self: &Arc<Self>, placement_id: String, handle: AdHandle) {
        let inner = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(LATE_REWARD_WINDOW) => {}
                _ = inner.lifetime.cancelled() => return,
            }
            inner.state.lock().cache.forget_retired(handle);
            inner.resolve_show(
                &placement_id,
                ShowResult::completed(&placement_id, PlacementType::Rewarded, AdsMessages::REWARDED_CLOSED),
            );
        });
    }

    fn shutdown(&self) {
        let handles = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.pending.clear();
            state.cache.drain_handles()
        };
        self.lifetime.cancel();
        self.adapter.detach();
        for handle in handles {
            self.adapter.destroy(handle);
        }
        info!(sdk = %self.sdk(), "ads service disposed");
    }
}

#[async_trait]
impl AdsService for SingleProviderAdsService {
    fn name(&self) -> &str {
        self.inner.sdk()
    }

    fn rewarded_available(&self) -> bool {
        let ids = self.inner.placement_ids(PlacementType::Rewarded);
        self.inner.state.lock().cache.any_available(ids.iter().map(String::as_str))
    }

    fn interstitial_available(&self) -> bool {
        let ids = self.inner.placement_ids(PlacementType::Interstitial);
        self.inner.state.lock().cache.any_available(ids.iter().map(String::as_str))
    }

    fn actions(&self) -> broadcast::Receiver<ActionEvent> {
        self.inner.bus.subscribe()
    }

    fn validate_integration(&self) {
        self.inner.adapter.validate_integration();
    }

    /// For an untouched placement this starts (and waits for) its first load.
    async fn is_placement_available(&self, placement_id: &str) -> bool {
        let inner = &self.inner;
        if !inner.settings.enable_ads || inner.lifetime.is_cancelled() {
            return false;
        }
        let Ok(placement) = inner.registry.resolve(placement_id) else {
            debug!(placement = placement_id, sdk = %inner.sdk(), "availability asked for unknown placement");
            return false;
        };
        if placement.placement_type == PlacementType::Banner
            || placement.native_id(inner.adapter.platform()).is_none()
        {
            return false;
        }

        let (cached, untouched) = {
            let mut state = inner.state.lock();
            let entry = state.cache.entry(placement_id);
            (entry.handle, !entry.attempted && !entry.load_in_progress())
        };
        if let Some(handle) = cached {
            return inner.adapter.can_show(handle);
        }
        if untouched {
            return inner.load(placement_id).await;
        }
        false
    }

    async fn is_type_available(&self, kind: PlacementType) -> bool {
        for placement_id in self.inner.placement_ids(kind) {
            if self.is_placement_available(&placement_id).await {
                return true;
            }
        }
        false
    }

    async fn load_ads(&self) {
        let mut ids = self.inner.placement_ids(PlacementType::Rewarded);
        ids.extend(self.inner.placement_ids(PlacementType::Interstitial));
        let results = join_all(ids.iter().map(|id| self.inner.load(id))).await;
        let loaded = results.iter().filter(|loaded| **loaded).count();
        info!(sdk = %self.inner.sdk(), loaded, total = results.len(), "ads preloaded");
    }

    async fn show(&self, placement_id: &str, kind: PlacementType) -> AdsResult<ShowResult> {
        let inner = &self.inner;
        if inner.lifetime.is_cancelled() {
            return Err(AdsError::Disposed);
        }
        let show_id = Uuid::new_v4();
        info!(%show_id, placement = placement_id, %kind, sdk = %inner.sdk(), "show requested");

        let Some(_guard) = ShowGuard::acquire(inner, placement_id) else {
            warn!(%show_id, placement = placement_id, sdk = %inner.sdk(), "show rejected, another show is running");
            return Ok(ShowResult::failure(placement_id, kind, AdsMessages::ADS_ALREADY_IN_PROGRESS));
        };
        inner.publish(placement_id, kind, ActionKind::Requested, "");

        let prepared = inner.prepare_show(placement_id, kind).await;
        if inner.lifetime.is_cancelled() {
            return Err(AdsError::Cancelled);
        }
        let result = match prepared {
            Ok(handle) => inner.await_show(placement_id, kind, handle, show_id).await?,
            Err(result) => {
                inner.publish(placement_id, kind, ActionKind::Failed, &result.message);
                result
            }
        };

        {
            let mut state = inner.state.lock();
            if state.history.len() == HISTORY_LIMIT {
                state.history.pop_front();
            }
            state.history.push_back(result.clone());
        }
        info!(
            %show_id,
            placement = placement_id,
            sdk = %inner.sdk(),
            rewarded = result.rewarded,
            error = result.error,
            message = %result.message,
            "show finished"
        );
        Ok(result)
    }

    async fn show_type(&self, kind: PlacementType) -> AdsResult<ShowResult> {
        for placement_id in self.inner.placement_ids(kind) {
            if self.is_placement_available(&placement_id).await {
                return self.show(&placement_id, kind).await;
            }
        }
        Ok(ShowResult::failure("", kind, AdsMessages::PLACEMENT_NOT_FOUND))
    }

    fn dispose(&self) {
        self.inner.shutdown();
    }
}

impl Drop for SingleProviderAdsService {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}
