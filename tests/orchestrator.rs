mod common;

use std::sync::Arc;
use tokio::time::{sleep, Duration};

use ads_mediation::bootstrap::build_orchestrator;
use ads_mediation::config::ConfigManager;
use ads_mediation::model::actions::ActionKind;
use ads_mediation::model::adapters::{ConfigAdapter, StaticConfigAdapter};
use ads_mediation::model::placements::PlacementType;
use ads_mediation::provider::simulated::SimulatedSettings;
use ads_mediation::service::{AdsOrchestrator, AdsService};

use common::{drain, settings, single_with, REWARD};

fn no_fill() -> SimulatedSettings {
    SimulatedSettings {
        fill_rate: 0.0,
        ..Default::default()
    }
}

fn orchestrator(android: SimulatedSettings, ios: SimulatedSettings) -> AdsOrchestrator {
    let orchestrator = AdsOrchestrator::new();
    let (_, admob) = single_with("admob", "android", android, settings());
    let (_, levelplay) = single_with("levelplay", "ios", ios, settings());
    orchestrator.register_provider("android", Arc::new(admob)).unwrap();
    orchestrator.register_provider("ios", Arc::new(levelplay)).unwrap();
    orchestrator
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_the_next_platform() {
    let orchestrator = orchestrator(no_fill(), SimulatedSettings::default());
    let mut actions = orchestrator.actions();

    let result = orchestrator.show_rewarded(REWARD).await.unwrap();
    assert!(result.rewarded);

    sleep(Duration::from_millis(10)).await;
    let events = drain(&mut actions);
    assert!(events
        .iter()
        .any(|e| e.sdk_name == "admob" && e.action == ActionKind::Failed));
    assert!(events
        .iter()
        .any(|e| e.sdk_name == "levelplay" && e.action == ActionKind::Rewarded));
}

#[tokio::test(start_paused = true)]
async fn nobody_ready_yields_no_ads_message() {
    let orchestrator = orchestrator(no_fill(), no_fill());

    let result = orchestrator.show_rewarded(REWARD).await.unwrap();
    assert!(result.error);
    assert_eq!(result.message, format!("No ads available for placement: {}", REWARD));

    let by_type = orchestrator.show_type(PlacementType::Interstitial).await.unwrap();
    assert!(by_type.error);
}

#[tokio::test(start_paused = true)]
async fn wired_from_configuration() {
    let document = r#"{
        "composite_timeout_ms": 500,
        "providers": [
            { "name": "admob", "platform": "android", "simulated": { "fill_rate": 0.0 } },
            { "name": "yandex", "platform": "android" },
            { "name": "editor", "platform": "editor", "sdk": "debug" }
        ],
        "placements": [
            {
                "id": "reward1",
                "type": "rewarded",
                "placements": [{ "platform": "android", "placement": "unit-reward" }]
            }
        ]
    }"#;
    let configuration = StaticConfigAdapter(serde_json::from_str(document).unwrap())
        .load()
        .unwrap();
    let manager = ConfigManager::new(configuration).unwrap();
    let orchestrator = build_orchestrator(&manager).unwrap();

    let result = orchestrator.show_rewarded("reward1").await.unwrap();
    assert!(result.rewarded);
    assert_eq!(result.reward_name, "coins");

    orchestrator.dispose();
    assert!(orchestrator.platforms().is_empty());
}
