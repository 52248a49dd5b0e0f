// src/model/placements.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub enum PlacementType {
    Rewarded,
    Interstitial,
    Banner,
}

impl PlacementType {
    pub const ALL: [PlacementType; 3] = [
        PlacementType::Rewarded,
        PlacementType::Interstitial,
        PlacementType::Banner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementType::Rewarded => "rewarded",
            PlacementType::Interstitial => "interstitial",
            PlacementType::Banner => "banner",
        }
    }
}

impl TryFrom<&str> for PlacementType {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "rewarded" => Ok(PlacementType::Rewarded),
            "interstitial" => Ok(PlacementType::Interstitial),
            "banner" => Ok(PlacementType::Banner),
            _ => Err(format!("Invalid value for PlacementType: {}", value)),
        }
    }
}

impl TryFrom<String> for PlacementType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PlacementType::try_from(value.as_str())
    }
}

impl From<PlacementType> for String {
    fn from(kind: PlacementType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for PlacementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical ad slot and the native unit ids it maps to on each ad network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub placement_type: PlacementType,
    /// platform name -> native unit id
    pub platform_ids: HashMap<String, String>,
}

impl Placement {
    pub fn native_id(&self, platform: &str) -> Option<&str> {
        self.platform_ids.get(platform).map(String::as_str)
    }
}

/// A placement as seen by a single platform.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlatformPlacement {
    pub id: String,
    pub platform: String,
    pub platform_placement: String,
    pub placement_type: PlacementType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_type_parses_case_insensitively() {
        assert_eq!(PlacementType::try_from("Rewarded"), Ok(PlacementType::Rewarded));
        assert_eq!(PlacementType::try_from("BANNER"), Ok(PlacementType::Banner));
        assert!(PlacementType::try_from("native").is_err());
    }

    #[test]
    fn placement_type_serializes_as_lowercase_name() {
        let json = serde_json::to_string(&PlacementType::Interstitial).unwrap();
        assert_eq!(json, "\"interstitial\"");
        let back: PlacementType = serde_json::from_str("\"rewarded\"").unwrap();
        assert_eq!(back, PlacementType::Rewarded);
    }
}
