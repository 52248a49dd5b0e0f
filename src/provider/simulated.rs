// src/provider/simulated.rs

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

use crate::error::{AdsError, AdsResult};
use crate::model::placements::PlacementType;
use crate::provider::{AdHandle, LoadOutcome, NativeEvent, NativeEventKind, NativeEventSink, ProviderAdapter};

/// How a simulated ad behaves once shown.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShowOutcome {
    /// Watched to the end, rewarded ads grant their reward.
    #[default]
    Completed,
    /// Closed early, no reward.
    Skipped,
    /// Full screen presentation failed.
    Failed,
    /// SDK never calls back.
    NoCallback,
}

fn default_fill_rate() -> f64 {
    1.0
}

fn default_load_latency() -> Option<u64> {
    Some(200)
}

fn default_show_duration() -> u64 {
    500
}

fn default_reward_name() -> String {
    "coins".to_string()
}

fn default_reward_amount() -> f64 {
    10.0
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SimulatedSettings {
    /// Probability in [0, 1] that a load returns an ad.
    #[serde(default = "default_fill_rate")]
    pub fill_rate: f64,
    /// `None` means loads never complete.
    #[serde(default = "default_load_latency")]
    pub load_latency_ms: Option<u64>,
    #[serde(default)]
    pub latency_jitter_ms: u64,
    #[serde(default = "default_show_duration")]
    pub show_duration_ms: u64,
    #[serde(default)]
    pub outcome: ShowOutcome,
    #[serde(default = "default_reward_name")]
    pub reward_name: String,
    #[serde(default = "default_reward_amount")]
    pub reward_amount: f64,
    #[serde(default)]
    pub init_fails: bool,
}

impl Default for SimulatedSettings {
    fn default() -> Self {
        Self {
            fill_rate: default_fill_rate(),
            load_latency_ms: default_load_latency(),
            latency_jitter_ms: 0,
            show_duration_ms: default_show_duration(),
            outcome: ShowOutcome::default(),
            reward_name: default_reward_name(),
            reward_amount: default_reward_amount(),
            init_fails: false,
        }
    }
}

struct LoadedAd {
    kind: PlacementType,
    native_id: String,
    shown: bool,
}

#[derive(Default)]
struct SimulatedState {
    next_handle: u64,
    ads: HashMap<AdHandle, LoadedAd>,
    sink: Option<NativeEventSink>,
}

/// In-process stand-in for an ad network SDK.
///
/// Loads resolve after a configurable latency with a configurable fill rate;
/// shows replay the native callback sequence a real SDK would produce.
pub struct SimulatedProvider {
    sdk_name: String,
    platform: String,
    settings: Mutex<SimulatedSettings>,
    state: Arc<Mutex<SimulatedState>>,
    load_calls: AtomicUsize,
    show_calls: AtomicUsize,
}

impl SimulatedProvider {
    pub fn new(sdk_name: &str, platform: &str, settings: SimulatedSettings) -> Self {
        Self {
            sdk_name: sdk_name.to_string(),
            platform: platform.to_string(),
            settings: Mutex::new(settings),
            state: Arc::new(Mutex::new(SimulatedState::default())),
            load_calls: AtomicUsize::new(0),
            show_calls: AtomicUsize::new(0),
        }
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut SimulatedSettings)) {
        update(&mut self.settings.lock());
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn show_calls(&self) -> usize {
        self.show_calls.load(Ordering::SeqCst)
    }

    pub fn live_ads(&self) -> usize {
        self.state.lock().ads.len()
    }

    pub fn is_attached(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    /// Pushes a native event as if the SDK had raised it.
    pub fn emit(&self, handle: AdHandle, kind: NativeEventKind) -> bool {
        Self::send(&self.state, NativeEvent { handle, kind })
    }

    /// Handles currently loaded for `native_id`.
    pub fn handles_for(&self, native_id: &str) -> Vec<AdHandle> {
        self.state
            .lock()
            .ads
            .iter()
            .filter(|(_, ad)| ad.native_id == native_id)
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn send(state: &Mutex<SimulatedState>, event: NativeEvent) -> bool {
        match &state.lock().sink {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    async fn load(&self, native_id: &str, kind: PlacementType) -> LoadOutcome {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let settings = self.settings.lock().clone();

        let Some(latency) = settings.load_latency_ms else {
            debug!(sdk = %self.sdk_name, native_id, "simulated load will never complete");
            return futures::future::pending().await;
        };
        let jitter = if settings.latency_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=settings.latency_jitter_ms)
        } else {
            0
        };
        sleep(Duration::from_millis(latency + jitter)).await;

        let filled = rand::thread_rng().gen_bool(settings.fill_rate.clamp(0.0, 1.0));
        if !filled {
            return LoadOutcome::Failed {
                code: 3,
                message: "No fill".to_string(),
            };
        }

        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = AdHandle(state.next_handle);
        state.ads.insert(
            handle,
            LoadedAd {
                kind,
                native_id: native_id.to_string(),
                shown: false,
            },
        );
        LoadOutcome::Loaded(handle)
    }
}

#[async_trait]
impl ProviderAdapter for SimulatedProvider {
    fn sdk_name(&self) -> &str {
        &self.sdk_name
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    async fn initialize(&self) -> AdsResult<()> {
        if self.settings.lock().init_fails {
            return Err(AdsError::Provider {
                sdk: self.sdk_name.clone(),
                message: "initialization failed".to_string(),
            });
        }
        info!(sdk = %self.sdk_name, "simulated sdk initialized");
        Ok(())
    }

    async fn load_rewarded(&self, native_id: &str) -> LoadOutcome {
        self.load(native_id, PlacementType::Rewarded).await
    }

    async fn load_interstitial(&self, native_id: &str) -> LoadOutcome {
        self.load(native_id, PlacementType::Interstitial).await
    }

    fn can_show(&self, handle: AdHandle) -> bool {
        self.state.lock().ads.get(&handle).is_some_and(|ad| !ad.shown)
    }

    fn show(&self, handle: AdHandle) {
        self.show_calls.fetch_add(1, Ordering::SeqCst);
        let kind = {
            let mut state = self.state.lock();
            match state.ads.get_mut(&handle) {
                Some(ad) => {
                    ad.shown = true;
                    ad.kind
                }
                None => return,
            }
        };
        let settings = self.settings.lock().clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let events: Vec<NativeEventKind> = match settings.outcome {
                ShowOutcome::NoCallback => return,
                ShowOutcome::Failed => vec![NativeEventKind::FullScreenFailed {
                    code: 1,
                    message: "Ad failed to show full screen content".to_string(),
                }],
                ShowOutcome::Skipped => vec![
                    NativeEventKind::FullScreenOpened,
                    NativeEventKind::ImpressionRecorded,
                    NativeEventKind::FullScreenClosed,
                ],
                ShowOutcome::Completed => {
                    let mut events = vec![
                        NativeEventKind::FullScreenOpened,
                        NativeEventKind::ImpressionRecorded,
                        NativeEventKind::Paid {
                            value_micros: 12_000,
                            currency: "USD".to_string(),
                        },
                    ];
                    if kind == PlacementType::Rewarded {
                        events.push(NativeEventKind::Rewarded {
                            reward_name: settings.reward_name.clone(),
                            reward_amount: settings.reward_amount,
                        });
                    }
                    events.push(NativeEventKind::FullScreenClosed);
                    events
                }
            };

            sleep(Duration::from_millis(settings.show_duration_ms)).await;
            for kind in events {
                if !Self::send(&state, NativeEvent { handle, kind }) {
                    break;
                }
            }
        });
    }

    fn destroy(&self, handle: AdHandle) {
        self.state.lock().ads.remove(&handle);
    }

    fn attach(&self, sink: NativeEventSink) {
        self.state.lock().sink = Some(sink);
    }

    fn detach(&self) {
        self.state.lock().sink = None;
    }

    fn validate_integration(&self) {
        info!(sdk = %self.sdk_name, platform = %self.platform, "simulated integration is valid");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn provider(settings: SimulatedSettings) -> SimulatedProvider {
        SimulatedProvider::new("sim", "android", settings)
    }

    #[tokio::test(start_paused = true)]
    async fn empty_fill_fails_load() {
        let sim = provider(SimulatedSettings {
            fill_rate: 0.0,
            ..Default::default()
        });
        let outcome = sim.load_rewarded("unit").await;
        assert!(matches!(outcome, LoadOutcome::Failed { code: 3, .. }));
        assert_eq!(sim.load_calls(), 1);
        assert_eq!(sim.live_ads(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_rewarded_show_replays_callbacks() {
        let sim = provider(SimulatedSettings::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        sim.attach(tx);

        let LoadOutcome::Loaded(handle) = sim.load_rewarded("unit").await else {
            panic!("expected a loaded ad");
        };
        assert!(sim.can_show(handle));
        sim.show(handle);
        assert!(!sim.can_show(handle));

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.handle, handle);
            let closed = event.kind == NativeEventKind::FullScreenClosed;
            kinds.push(event.kind);
            if closed {
                break;
            }
        }
        assert_eq!(kinds.first(), Some(&NativeEventKind::FullScreenOpened));
        assert!(kinds.iter().any(|k| matches!(k, NativeEventKind::Rewarded { reward_amount, .. } if *reward_amount == 10.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_provider_drops_events() {
        let sim = provider(SimulatedSettings::default());
        assert!(!sim.emit(AdHandle(1), NativeEventKind::Clicked));
        let (tx, _rx) = mpsc::unbounded_channel();
        sim.attach(tx);
        assert!(sim.emit(AdHandle(1), NativeEventKind::Clicked));
        sim.detach();
        assert!(!sim.is_attached());
    }
}
