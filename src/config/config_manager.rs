// src/config/config_manager.rs

use std::sync::Arc;
use std::time::Duration;

use crate::error::{AdsError, AdsResult};
use crate::model::adapters::{AdsConfiguration, ProviderConfig};
use crate::model::registry::PlacementRegistry;
use crate::service::ServiceSettings;

/// 配置管理器：校验配置，并在启动时构建广告位注册表和平台顺序
#[derive(Clone, Debug)]
pub struct ConfigManager {
    configuration: AdsConfiguration,
    registry: Arc<PlacementRegistry>,
    provider_order: Vec<String>,
}

impl ConfigManager {
    pub fn new(configuration: AdsConfiguration) -> AdsResult<Self> {
        if configuration.providers.is_empty() {
            return Err(AdsError::Config("no ads providers configured".to_string()));
        }
        if configuration.composite_timeout_ms == 0 {
            return Err(AdsError::Config("composite_timeout_ms must be positive".to_string()));
        }
        if !(configuration.show_timeout_secs > 0.0) {
            return Err(AdsError::Config("show_timeout_secs must be positive".to_string()));
        }
        if !(configuration.reload_ads_interval_secs >= 0.0) {
            return Err(AdsError::Config("reload_ads_interval_secs must not be negative".to_string()));
        }

        let registry = PlacementRegistry::from_placements(
            configuration.placements.iter().map(|p| p.to_placement()),
        );

        // 默认平台优先，其余按配置顺序
        let mut provider_order: Vec<String> = Vec::new();
        if !configuration.default_provider.is_empty() {
            provider_order.push(configuration.default_provider.clone());
        }
        for provider in &configuration.providers {
            if !provider_order.contains(&provider.name) {
                provider_order.push(provider.name.clone());
            }
        }

        let manager = ConfigManager {
            configuration,
            registry: Arc::new(registry),
            provider_order,
        };
        manager.check_order()?;
        Ok(manager)
    }

    /// 用逗号分隔的列表覆盖平台顺序，例如 "admob,yandex"
    pub fn with_provider_order(mut self, providers: &str) -> AdsResult<Self> {
        let order: Vec<String> = providers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if !order.is_empty() {
            self.provider_order = order;
            self.check_order()?;
        }
        Ok(self)
    }

    fn check_order(&self) -> AdsResult<()> {
        for name in &self.provider_order {
            if self.provider(name).is_none() {
                return Err(AdsError::Config(format!("unknown ads provider: {}", name)));
            }
        }
        Ok(())
    }

    pub fn configuration(&self) -> &AdsConfiguration {
        &self.configuration
    }

    pub fn registry(&self) -> Arc<PlacementRegistry> {
        self.registry.clone()
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.configuration.providers.iter().find(|p| p.name == name)
    }

    /// 按编排器查询顺序返回平台配置
    pub fn providers_in_order(&self) -> Vec<&ProviderConfig> {
        self.provider_order
            .iter()
            .filter_map(|name| self.provider(name))
            .collect()
    }

    pub fn composite_timeout(&self) -> Duration {
        Duration::from_millis(self.configuration.composite_timeout_ms)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            enable_ads: self.configuration.enable_ads,
            reload_interval: Duration::from_secs_f64(self.configuration.reload_ads_interval_secs),
            show_timeout: Duration::from_secs_f64(self.configuration.show_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::adapters::{PlacementConfig, ProviderKind};
    use crate::model::placements::PlacementType;
    use crate::provider::simulated::SimulatedSettings;

    fn provider(name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            platform: "android".to_string(),
            sdk: ProviderKind::Simulated,
            simulated: SimulatedSettings::default(),
            debug: Default::default(),
        }
    }

    fn configuration() -> AdsConfiguration {
        AdsConfiguration {
            enable_ads: true,
            reload_ads_interval_secs: 30.0,
            show_timeout_secs: 60.0,
            composite_timeout_ms: 1500,
            default_provider: "yandex".to_string(),
            providers: vec![provider("admob"), provider("levelplay"), provider("yandex")],
            placements: vec![PlacementConfig {
                id: "reward1".to_string(),
                description: String::new(),
                placement_type: PlacementType::Rewarded,
                placements: vec![],
            }],
        }
    }

    #[test]
    fn default_provider_goes_first() {
        let manager = ConfigManager::new(configuration()).unwrap();
        let names: Vec<_> = manager.providers_in_order().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["yandex", "admob", "levelplay"]);
        assert!(manager.registry().contains("reward1"));
    }

    #[test]
    fn provider_order_can_be_overridden() {
        let manager = ConfigManager::new(configuration())
            .unwrap()
            .with_provider_order("levelplay, admob")
            .unwrap();
        let names: Vec<_> = manager.providers_in_order().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["levelplay", "admob"]);
    }

    #[test]
    fn unknown_provider_in_order_is_rejected() {
        let result = ConfigManager::new(configuration())
            .unwrap()
            .with_provider_order("unity");
        assert!(matches!(result, Err(AdsError::Config(_))));
    }

    #[test]
    fn empty_provider_list_is_rejected() {
        let mut config = configuration();
        config.providers.clear();
        config.default_provider.clear();
        assert!(matches!(ConfigManager::new(config), Err(AdsError::Config(_))));
    }

    #[test]
    fn settings_follow_configuration() {
        let settings = ConfigManager::new(configuration()).unwrap().service_settings();
        assert!(settings.enable_ads);
        assert_eq!(settings.reload_interval, Duration::from_secs(30));
        assert_eq!(settings.show_timeout, Duration::from_secs(60));
    }
}
