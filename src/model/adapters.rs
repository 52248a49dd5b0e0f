// src/model/adapters.rs

use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::AdsResult;
use crate::model::placements::{Placement, PlacementType};
use crate::provider::simulated::SimulatedSettings;
use crate::service::debug::DebugSettings;

fn default_true() -> bool {
    true
}

fn default_reload_interval() -> f64 {
    30.0
}

fn default_show_timeout() -> f64 {
    120.0
}

fn default_composite_timeout() -> u64 {
    1500
}

/// 广告配置文件根节点
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdsConfiguration {
    #[serde(default = "default_true")]
    pub enable_ads: bool,
    #[serde(default = "default_reload_interval")]
    pub reload_ads_interval_secs: f64,
    #[serde(default = "default_show_timeout")]
    pub show_timeout_secs: f64,
    #[serde(default = "default_composite_timeout")]
    pub composite_timeout_ms: u64,
    /// 编排器优先尝试的平台名称
    #[serde(default)]
    pub default_provider: String,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub placements: Vec<PlacementConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlacementConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub placement_type: PlacementType,
    #[serde(default)]
    pub placements: Vec<PlatformPlacementConfig>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlatformPlacementConfig {
    pub platform: String,
    pub placement: String,
}

impl PlacementConfig {
    pub fn to_placement(&self) -> Placement {
        Placement {
            id: self.id.clone(),
            description: self.description.clone(),
            placement_type: self.placement_type,
            platform_ids: self
                .placements
                .iter()
                .map(|p| (p.platform.clone(), p.placement.clone()))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Simulated,
    Debug,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    /// 对应广告位 `placements` 中的平台名
    pub platform: String,
    #[serde(default)]
    pub sdk: ProviderKind,
    #[serde(default)]
    pub simulated: SimulatedSettings,
    #[serde(default)]
    pub debug: DebugSettings,
}

pub trait ConfigAdapter: Send + Sync {
    fn load(&self) -> AdsResult<AdsConfiguration>;
}

pub struct FileConfigAdapter {
    pub config_file: String,
}

impl FileConfigAdapter {
    pub fn new(config_file: &str) -> Self {
        Self {
            config_file: config_file.to_string(),
        }
    }
}

impl ConfigAdapter for FileConfigAdapter {
    fn load(&self) -> AdsResult<AdsConfiguration> {
        let content = fs::read_to_string(&self.config_file)?;
        let config: AdsConfiguration = serde_json::from_str(&content)?;
        Ok(config)
    }
}

/// 直接返回已解析的配置（测试或嵌入使用）
pub struct StaticConfigAdapter(pub AdsConfiguration);

impl ConfigAdapter for StaticConfigAdapter {
    fn load(&self) -> AdsResult<AdsConfiguration> {
        Ok(self.0.clone())
    }
}
