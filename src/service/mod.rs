//! The uniform ads contract and its implementations.
//!
//! [`SingleProviderAdsService`] drives one ad network, [`CompositeAdsService`]
//! races several of them, [`AdsOrchestrator`] routes across platforms and
//! [`DebugAdsService`] always fills.

pub mod cache;
pub mod composite;
pub mod debug;
pub mod events;
pub mod orchestrator;
pub mod single;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::AdsResult;
use crate::model::actions::ActionEvent;
use crate::model::placements::PlacementType;
use crate::model::results::ShowResult;

pub use composite::{AdsStatus, CompositeAdsService};
pub use debug::DebugAdsService;
pub use events::ActionBus;
pub use orchestrator::AdsOrchestrator;
pub use single::SingleProviderAdsService;

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub enable_ads: bool,
    /// Minimum spacing between two loads of the same placement.
    pub reload_interval: Duration,
    /// Upper bound on waiting for a provider to finish a show.
    pub show_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            enable_ads: true,
            reload_interval: Duration::from_secs(30),
            show_timeout: Duration::from_secs(120),
        }
    }
}

#[async_trait]
pub trait AdsService: Send + Sync {
    fn name(&self) -> &str;

    fn rewarded_available(&self) -> bool;

    fn interstitial_available(&self) -> bool;

    /// Subscribes to this service's action stream.
    fn actions(&self) -> broadcast::Receiver<ActionEvent>;

    fn validate_integration(&self);

    async fn is_placement_available(&self, placement_id: &str) -> bool;

    async fn is_type_available(&self, kind: PlacementType) -> bool;

    async fn load_ads(&self);

    /// Shows `placement_id`, resolving once the provider reports an outcome.
    ///
    /// Ad conditions are reported through `ShowResult::error`; `Err` means the
    /// call itself could not complete (disposed service, no provider).
    async fn show(&self, placement_id: &str, kind: PlacementType) -> AdsResult<ShowResult>;

    /// Shows the first available placement of `kind`.
    async fn show_type(&self, kind: PlacementType) -> AdsResult<ShowResult>;

    async fn show_rewarded(&self, placement_id: &str) -> AdsResult<ShowResult> {
        self.show(placement_id, PlacementType::Rewarded).await
    }

    async fn show_interstitial(&self, placement_id: &str) -> AdsResult<ShowResult> {
        self.show(placement_id, PlacementType::Interstitial).await
    }

    /// Cancels pending work and releases provider resources. Idempotent.
    fn dispose(&self);
}
