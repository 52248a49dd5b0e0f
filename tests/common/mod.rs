#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;

use ads_mediation::model::actions::{ActionEvent, ActionKind};
use ads_mediation::model::placements::{Placement, PlacementType};
use ads_mediation::model::registry::PlacementRegistry;
use ads_mediation::provider::simulated::{SimulatedProvider, SimulatedSettings};
use ads_mediation::service::{ServiceSettings, SingleProviderAdsService};

pub const REWARD: &str = "reward1";
pub const INTER: &str = "inter1";
pub const BANNER: &str = "banner1";

fn placement(id: &str, kind: PlacementType, ids: &[(&str, &str)]) -> Placement {
    Placement {
        id: id.to_string(),
        description: String::new(),
        placement_type: kind,
        platform_ids: ids
            .iter()
            .map(|(platform, native)| (platform.to_string(), native.to_string()))
            .collect::<HashMap<_, _>>(),
    }
}

pub fn registry() -> Arc<PlacementRegistry> {
    Arc::new(PlacementRegistry::from_placements(vec![
        placement(REWARD, PlacementType::Rewarded, &[("android", "unit-reward"), ("ios", "ios-reward")]),
        placement(INTER, PlacementType::Interstitial, &[("android", "unit-inter"), ("ios", "ios-inter")]),
        placement(BANNER, PlacementType::Banner, &[("android", "unit-banner")]),
    ]))
}

pub fn settings() -> ServiceSettings {
    ServiceSettings {
        enable_ads: true,
        reload_interval: Duration::from_secs(30),
        show_timeout: Duration::from_secs(120),
    }
}

pub fn simulated(sdk: &str, platform: &str, settings: SimulatedSettings) -> Arc<SimulatedProvider> {
    Arc::new(SimulatedProvider::new(sdk, platform, settings))
}

pub fn single_with(
    sdk: &str,
    platform: &str,
    simulated_settings: SimulatedSettings,
    service_settings: ServiceSettings,
) -> (Arc<SimulatedProvider>, SingleProviderAdsService) {
    let provider = simulated(sdk, platform, simulated_settings);
    let service = SingleProviderAdsService::new(provider.clone(), registry(), service_settings);
    (provider, service)
}

pub fn single(sdk: &str, simulated_settings: SimulatedSettings) -> (Arc<SimulatedProvider>, SingleProviderAdsService) {
    single_with(sdk, "android", simulated_settings, settings())
}

pub fn drain(actions: &mut broadcast::Receiver<ActionEvent>) -> Vec<ActionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = actions.try_recv() {
        events.push(event);
    }
    events
}

pub fn kinds(events: &[ActionEvent]) -> Vec<ActionKind> {
    events.iter().map(|e| e.action).collect()
}
