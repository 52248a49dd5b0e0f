// src/service/composite.rs

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{AdsError, AdsResult};
use crate::model::actions::ActionEvent;
use crate::model::placements::PlacementType;
use crate::model::results::ShowResult;
use crate::service::events::{forward_actions, ActionBus};
use crate::service::AdsService;

pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_millis(1500);

/// Outcome of one provider's availability check within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdsStatus {
    Loading,
    Ready,
    Failed,
}

enum AvailabilityCheck<'a> {
    Placement(&'a str),
    Type(PlacementType),
}

/// Mediates several services that serve the same logical platform slot.
///
/// Availability checks race every child against a bounded window; the first
/// `Ready` child in registration order is remembered and serves the next show.
pub struct CompositeAdsService {
    name: String,
    services: Vec<Arc<dyn AdsService>>,
    round_timeout: Duration,
    selected: Mutex<Option<usize>>,
    last_round: Mutex<Vec<AdsStatus>>,
    bus: ActionBus,
    lifetime: CancellationToken,
}

impl CompositeAdsService {
    /// Must be called from within a tokio runtime.
    pub fn new(name: &str, services: Vec<Arc<dyn AdsService>>, round_timeout: Duration) -> Self {
        let bus = ActionBus::new();
        let lifetime = CancellationToken::new();
        for service in &services {
            forward_actions(service.actions(), bus.clone(), lifetime.clone());
        }
        info!(composite = name, providers = services.len(), timeout_ms = round_timeout.as_millis() as u64, "composite ads service created");

        Self {
            name: name.to_string(),
            last_round: Mutex::new(vec![AdsStatus::Loading; services.len()]),
            services,
            round_timeout,
            selected: Mutex::new(None),
            bus,
            lifetime,
        }
    }

    /// Statuses recorded by the latest availability round.
    pub fn statuses(&self) -> Vec<AdsStatus> {
        self.last_round.lock().clone()
    }

    pub fn selected_provider(&self) -> Option<String> {
        let index = (*self.selected.lock())?;
        self.services.get(index).map(|s| s.name().to_string())
    }

    fn selected_service(&self) -> AdsResult<Arc<dyn AdsService>> {
        let index = (*self.selected.lock()).ok_or(AdsError::NoProviderSelected)?;
        self.services.get(index).cloned().ok_or(AdsError::NoProviderSelected)
    }

    async fn race(&self, check: AvailabilityCheck<'_>) -> bool {
        if self.lifetime.is_cancelled() {
            return false;
        }
        let started = Instant::now();
        let statuses = Mutex::new(vec![AdsStatus::Loading; self.services.len()]);
        let checks = self.services.iter().enumerate().map(|(index, service)| {
            let statuses = &statuses;
            let check = &check;
            async move {
                let ready = match check {
                    AvailabilityCheck::Placement(placement_id) => service.is_placement_available(placement_id).await,
                    AvailabilityCheck::Type(kind) => service.is_type_available(*kind).await,
                };
                statuses.lock()[index] = if ready { AdsStatus::Ready } else { AdsStatus::Failed };
            }
        });

        // providers still Loading when the window closes sit this round out
        tokio::select! {
            _ = timeout(self.round_timeout, join_all(checks)) => {}
            _ = self.lifetime.cancelled() => return false,
        }

        let statuses = statuses.into_inner();
        let winner = statuses.iter().position(|status| *status == AdsStatus::Ready);
        *self.selected.lock() = winner;
        *self.last_round.lock() = statuses.clone();

        debug!(
            composite = %self.name,
            ?statuses,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "availability round finished"
        );
        if let Some(index) = winner {
            info!(composite = %self.name, provider = %self.services[index].name(), "provider selected");
        }
        winner.is_some()
    }
}

#[async_trait]
impl AdsService for CompositeAdsService {
    fn name(&self) -> &str {
        &self.name
    }

    fn rewarded_available(&self) -> bool {
        self.services.iter().any(|s| s.rewarded_available())
    }

    fn interstitial_available(&self) -> bool {
        self.services.iter().any(|s| s.interstitial_available())
    }

    fn actions(&self) -> broadcast::Receiver<ActionEvent> {
        self.bus.subscribe()
    }

    fn validate_integration(&self) {
        for service in &self.services {
            service.validate_integration();
        }
    }

    async fn is_placement_available(&self, placement_id: &str) -> bool {
        self.race(AvailabilityCheck::Placement(placement_id)).await
    }

    async fn is_type_available(&self, kind: PlacementType) -> bool {
        self.race(AvailabilityCheck::Type(kind)).await
    }

    async fn load_ads(&self) {
        join_all(self.services.iter().map(|s| s.load_ads())).await;
    }

    async fn show(&self, placement_id: &str, kind: PlacementType) -> AdsResult<ShowResult> {
        self.selected_service()?.show(placement_id, kind).await
    }

    async fn show_type(&self, kind: PlacementType) -> AdsResult<ShowResult> {
        self.selected_service()?.show_type(kind).await
    }

    fn dispose(&self) {
        if self.lifetime.is_cancelled() {
            return;
        }
        self.lifetime.cancel();
        for service in &self.services {
            service.dispose();
        }
        *self.selected.lock() = None;
        info!(composite = %self.name, "composite ads service disposed");
    }
}
