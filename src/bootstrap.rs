// src/bootstrap.rs

use std::sync::Arc;
use tracing::info;

use crate::config::ConfigManager;
use crate::error::AdsResult;
use crate::model::adapters::{ProviderConfig, ProviderKind};
use crate::provider::simulated::SimulatedProvider;
use crate::service::{AdsOrchestrator, AdsService, CompositeAdsService, DebugAdsService, SingleProviderAdsService};

/// Builds the service for one configured provider.
pub fn build_service(config: &ConfigManager, provider: &ProviderConfig) -> Arc<dyn AdsService> {
    match provider.sdk {
        ProviderKind::Simulated => {
            let adapter = Arc::new(SimulatedProvider::new(
                &provider.name,
                &provider.platform,
                provider.simulated.clone(),
            ));
            Arc::new(SingleProviderAdsService::new(
                adapter,
                config.registry(),
                config.service_settings(),
            ))
        }
        ProviderKind::Debug => Arc::new(DebugAdsService::new(provider.debug.clone())),
    }
}

/// Wires every configured provider into an orchestrator.
///
/// Providers sharing a platform are raced through a composite; platforms are
/// registered in the order their first provider appears.
pub fn build_orchestrator(config: &ConfigManager) -> AdsResult<AdsOrchestrator> {
    let mut groups: Vec<(String, Vec<Arc<dyn AdsService>>)> = Vec::new();
    for provider in config.providers_in_order() {
        let service = build_service(config, provider);
        match groups.iter_mut().find(|(platform, _)| *platform == provider.platform) {
            Some((_, services)) => services.push(service),
            None => groups.push((provider.platform.clone(), vec![service])),
        }
    }

    let orchestrator = AdsOrchestrator::new();
    for (platform, mut services) in groups {
        let service: Arc<dyn AdsService> = if services.len() == 1 {
            services.remove(0)
        } else {
            let name = format!("{}-composite", platform);
            Arc::new(CompositeAdsService::new(&name, services, config.composite_timeout()))
        };
        orchestrator.register_provider(&platform, service)?;
    }

    info!(platforms = ?orchestrator.platforms(), "ads orchestrator ready");
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::adapters::AdsConfiguration;

    const CONFIG: &str = r#"{
        "default_provider": "yandex",
        "providers": [
            { "name": "admob", "platform": "android" },
            { "name": "yandex", "platform": "android" },
            { "name": "editor", "platform": "editor", "sdk": "debug" }
        ],
        "placements": [
            {
                "id": "reward1",
                "type": "rewarded",
                "placements": [{ "platform": "android", "placement": "unit-1" }]
            }
        ]
    }"#;

    #[tokio::test]
    async fn providers_sharing_a_platform_become_one_composite() {
        let configuration: AdsConfiguration = serde_json::from_str(CONFIG).unwrap();
        let manager = ConfigManager::new(configuration).unwrap();
        let orchestrator = build_orchestrator(&manager).unwrap();

        assert_eq!(orchestrator.platforms(), vec!["android", "editor"]);
        assert_eq!(orchestrator.service("android").unwrap().name(), "android-composite");
        assert_eq!(orchestrator.service("editor").unwrap().name(), "debug");
        orchestrator.dispose();
    }
}
