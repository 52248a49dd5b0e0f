// src/service/debug.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::info;

use crate::error::{AdsError, AdsResult};
use crate::model::actions::{ActionEvent, ActionKind};
use crate::model::placements::PlacementType;
use crate::model::results::{AdsMessages, ShowResult};
use crate::service::events::ActionBus;
use crate::service::AdsService;

pub const DEBUG_SDK: &str = "debug";
const DEBUG_COMPLETE: &str = "Complete debug!";

fn default_true() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DebugSettings {
    #[serde(default = "default_true")]
    pub rewarded_available: bool,
    #[serde(default = "default_true")]
    pub interstitial_available: bool,
    #[serde(default)]
    pub unavailable_placements: Vec<String>,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            rewarded_available: true,
            interstitial_available: true,
            unavailable_placements: Vec::new(),
        }
    }
}

/// Fills every request instantly. Meant for editor builds and local testing.
pub struct DebugAdsService {
    settings: DebugSettings,
    bus: ActionBus,
    disposed: AtomicBool,
}

impl DebugAdsService {
    pub fn new(settings: DebugSettings) -> Self {
        Self {
            settings,
            bus: ActionBus::new(),
            disposed: AtomicBool::new(false),
        }
    }

    fn type_enabled(&self, kind: PlacementType) -> bool {
        match kind {
            PlacementType::Rewarded => self.settings.rewarded_available,
            PlacementType::Interstitial => self.settings.interstitial_available,
            PlacementType::Banner => false,
        }
    }

    fn publish(&self, placement_id: &str, kind: PlacementType, action: ActionKind, message: &str) {
        self.bus
            .publish(ActionEvent::new(placement_id, kind, action, DEBUG_SDK).with_message(message));
    }
}

#[async_trait]
impl AdsService for DebugAdsService {
    fn name(&self) -> &str {
        DEBUG_SDK
    }

    fn rewarded_available(&self) -> bool {
        self.settings.rewarded_available
    }

    fn interstitial_available(&self) -> bool {
        self.settings.interstitial_available
    }

    fn actions(&self) -> broadcast::Receiver<ActionEvent> {
        self.bus.subscribe()
    }

    fn validate_integration(&self) {
        info!("debug ads integration is always valid");
    }

    async fn is_placement_available(&self, placement_id: &str) -> bool {
        !self.disposed.load(Ordering::SeqCst)
            && !self.settings.unavailable_placements.iter().any(|p| p == placement_id)
    }

    async fn is_type_available(&self, kind: PlacementType) -> bool {
        !self.disposed.load(Ordering::SeqCst) && self.type_enabled(kind)
    }

    async fn load_ads(&self) {
        info!("debug ads loaded");
    }

    async fn show(&self, placement_id: &str, kind: PlacementType) -> AdsResult<ShowResult> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AdsError::Disposed);
        }
        self.publish(placement_id, kind, ActionKind::Requested, "");
        if !self.is_placement_available(placement_id).await || !self.type_enabled(kind) {
            self.publish(placement_id, kind, ActionKind::Failed, AdsMessages::PLACEMENT_CAPPED);
            return Ok(ShowResult::failure(placement_id, kind, AdsMessages::PLACEMENT_CAPPED));
        }

        self.publish(placement_id, kind, ActionKind::Opened, "Reward open");
        let result = match kind {
            PlacementType::Rewarded => {
                self.publish(placement_id, kind, ActionKind::Rewarded, "Reward granted");
                ShowResult {
                    message: DEBUG_COMPLETE.to_string(),
                    ..ShowResult::rewarded(placement_id, "", 0.0)
                }
            }
            _ => {
                self.publish(placement_id, kind, ActionKind::Closed, "");
                ShowResult::completed(placement_id, kind, DEBUG_COMPLETE)
            }
        };
        Ok(result)
    }

    async fn show_type(&self, kind: PlacementType) -> AdsResult<ShowResult> {
        self.show("none", kind).await
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rewarded_show_grants_reward_and_emits_actions() {
        let service = DebugAdsService::new(DebugSettings::default());
        let mut actions = service.actions();

        let result = service.show_rewarded("bonus").await.unwrap();
        assert!(result.rewarded);
        assert!(!result.error);
        assert_eq!(result.message, DEBUG_COMPLETE);

        let kinds: Vec<_> = (0..3).map(|_| actions.try_recv().unwrap().action).collect();
        assert_eq!(kinds, vec![ActionKind::Requested, ActionKind::Opened, ActionKind::Rewarded]);
    }

    #[tokio::test]
    async fn listed_placements_are_unavailable() {
        let service = DebugAdsService::new(DebugSettings {
            unavailable_placements: vec!["blocked".to_string()],
            ..Default::default()
        });
        assert!(!service.is_placement_available("blocked").await);
        let result = service.show_interstitial("blocked").await.unwrap();
        assert!(result.error);
        assert_eq!(result.message, AdsMessages::PLACEMENT_CAPPED);
    }

    #[tokio::test]
    async fn disposed_service_rejects_shows() {
        let service = DebugAdsService::new(DebugSettings::default());
        service.dispose();
        assert!(matches!(service.show_rewarded("bonus").await, Err(AdsError::Disposed)));
    }
}
