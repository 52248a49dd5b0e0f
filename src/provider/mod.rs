//! Narrow capability contract between the mediation core and an ad network SDK.
//!
//! Adapters translate their SDK's callbacks into [`NativeEvent`]s pushed onto
//! the sink handed to [`ProviderAdapter::attach`]. The owning service drains
//! that sink from a single task, so adapters may deliver events from any
//! thread without further locking.

pub mod simulated;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::AdsResult;

/// Opaque reference to one loaded ad inside an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(AdHandle),
    Failed { code: i32, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeEventKind {
    Clicked,
    Paid { value_micros: i64, currency: String },
    ImpressionRecorded,
    FullScreenOpened,
    FullScreenClosed,
    FullScreenFailed { code: i32, message: String },
    Rewarded { reward_name: String, reward_amount: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    pub handle: AdHandle,
    pub kind: NativeEventKind,
}

pub type NativeEventSink = mpsc::UnboundedSender<NativeEvent>;

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Short SDK name reported on action events, e.g. "admob".
    fn sdk_name(&self) -> &str;

    /// Platform key used to pick native unit ids out of a placement.
    fn platform(&self) -> &str;

    async fn initialize(&self) -> AdsResult<()>;

    async fn load_rewarded(&self, native_id: &str) -> LoadOutcome;

    async fn load_interstitial(&self, native_id: &str) -> LoadOutcome;

    fn can_show(&self, handle: AdHandle) -> bool;

    /// Starts presenting the ad. Completion arrives later as native events.
    fn show(&self, handle: AdHandle);

    fn destroy(&self, handle: AdHandle);

    fn attach(&self, sink: NativeEventSink);

    fn detach(&self);

    fn validate_integration(&self) {}
}
