// src/service/orchestrator.rs

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AdsError, AdsResult};
use crate::model::actions::ActionEvent;
use crate::model::placements::PlacementType;
use crate::model::results::{AdsMessages, ShowResult};
use crate::service::events::{forward_actions, ActionBus};
use crate::service::AdsService;

const ORCHESTRATOR_NAME: &str = "orchestrator";

struct Registration {
    platform: String,
    service: Arc<dyn AdsService>,
    forwarder: CancellationToken,
}

/// Routes every call across the registered platforms, first match wins.
///
/// Registration order is the fallback order. The orchestrator's own action
/// stream merges the streams of every registered service.
pub struct AdsOrchestrator {
    registrations: RwLock<Vec<Registration>>,
    bus: ActionBus,
    lifetime: CancellationToken,
}

impl AdsOrchestrator {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
            bus: ActionBus::new(),
            lifetime: CancellationToken::new(),
        }
    }

    /// Adds `service` for `platform`. Re-registering a platform replaces the
    /// previous service in place and disposes it.
    pub fn register_provider(&self, platform: &str, service: Arc<dyn AdsService>) -> AdsResult<()> {
        if self.lifetime.is_cancelled() {
            return Err(AdsError::Disposed);
        }
        let forwarder = self.lifetime.child_token();
        forward_actions(service.actions(), self.bus.clone(), forwarder.clone());

        let replaced = {
            let mut registrations = self.registrations.write();
            let registration = Registration {
                platform: platform.to_string(),
                service: service.clone(),
                forwarder,
            };
            match registrations.iter_mut().find(|r| r.platform == platform) {
                Some(existing) => Some(std::mem::replace(existing, registration)),
                None => {
                    registrations.push(registration);
                    None
                }
            }
        };

        match replaced {
            Some(old) => {
                warn!(platform, old = %old.service.name(), new = %service.name(), "ads provider replaced");
                old.forwarder.cancel();
                old.service.dispose();
            }
            None => info!(platform, service = %service.name(), "ads provider registered"),
        }
        Ok(())
    }

    /// Registered platforms in fallback order.
    pub fn platforms(&self) -> Vec<String> {
        self.registrations.read().iter().map(|r| r.platform.clone()).collect()
    }

    pub fn service(&self, platform: &str) -> Option<Arc<dyn AdsService>> {
        self.registrations
            .read()
            .iter()
            .find(|r| r.platform == platform)
            .map(|r| r.service.clone())
    }

    fn services(&self) -> Vec<Arc<dyn AdsService>> {
        self.registrations.read().iter().map(|r| r.service.clone()).collect()
    }

    async fn first_with_placement(&self, placement_id: &str) -> Option<Arc<dyn AdsService>> {
        for service in self.services() {
            if service.is_placement_available(placement_id).await {
                return Some(service);
            }
            debug!(placement = placement_id, service = %service.name(), "placement unavailable, trying next");
        }
        None
    }

    async fn first_with_type(&self, kind: PlacementType) -> Option<Arc<dyn AdsService>> {
        for service in self.services() {
            if service.is_type_available(kind).await {
                return Some(service);
            }
        }
        None
    }
}

impl Default for AdsOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdsService for AdsOrchestrator {
    fn name(&self) -> &str {
        ORCHESTRATOR_NAME
    }

    fn rewarded_available(&self) -> bool {
        self.services().iter().any(|s| s.rewarded_available())
    }

    fn interstitial_available(&self) -> bool {
        self.services().iter().any(|s| s.interstitial_available())
    }

    fn actions(&self) -> broadcast::Receiver<ActionEvent> {
        self.bus.subscribe()
    }

    fn validate_integration(&self) {
        for service in self.services() {
            service.validate_integration();
        }
    }

    async fn is_placement_available(&self, placement_id: &str) -> bool {
        self.first_with_placement(placement_id).await.is_some()
    }

    async fn is_type_available(&self, kind: PlacementType) -> bool {
        self.first_with_type(kind).await.is_some()
    }

    async fn load_ads(&self) {
        let services = self.services();
        join_all(services.iter().map(|s| s.load_ads())).await;
    }

    async fn show(&self, placement_id: &str, kind: PlacementType) -> AdsResult<ShowResult> {
        if self.lifetime.is_cancelled() {
            return Err(AdsError::Disposed);
        }
        match self.first_with_placement(placement_id).await {
            Some(service) => {
                debug!(placement = placement_id, service = %service.name(), "routing show");
                service.show(placement_id, kind).await
            }
            None => {
                info!(placement = placement_id, %kind, "no provider has this placement ready");
                Ok(ShowResult::failure(placement_id, kind, AdsMessages::no_ads_for_placement(placement_id)))
            }
        }
    }

    async fn show_type(&self, kind: PlacementType) -> AdsResult<ShowResult> {
        if self.lifetime.is_cancelled() {
            return Err(AdsError::Disposed);
        }
        match self.first_with_type(kind).await {
            Some(service) => service.show_type(kind).await,
            None => Ok(ShowResult::failure("", kind, AdsMessages::no_ads_for_type(kind))),
        }
    }

    fn dispose(&self) {
        if self.lifetime.is_cancelled() {
            return;
        }
        self.lifetime.cancel();
        let registrations = std::mem::take(&mut *self.registrations.write());
        for registration in registrations {
            registration.service.dispose();
        }
        info!("ads orchestrator disposed");
    }
}
