// src/model/results.rs

use serde::{Deserialize, Serialize};

use crate::model::placements::PlacementType;

/// User-facing messages carried by `ShowResult::message`.
pub struct AdsMessages;

impl AdsMessages {
    pub const REWARDED: &'static str = "Rewarded";
    pub const REWARDED_CLOSED: &'static str = "Rewarded video is closed";
    pub const REWARDED_UNAVAILABLE: &'static str = "Rewarded video is not available";
    pub const REWARDED_FAILED: &'static str = "Rewarded video failed";
    pub const PLACEMENT_CAPPED: &'static str = "Rewarded video placement is capped";
    pub const INTERSTITIAL_CLOSED: &'static str = "Interstitial ad closed";
    pub const INTERSTITIAL_UNAVAILABLE: &'static str = "Interstitial ad is not available";
    pub const INTERSTITIAL_FAILED: &'static str = "Interstitial ad failed";
    pub const PLACEMENT_NOT_FOUND: &'static str = "Placement not found";
    pub const PLACEMENT_UNAVAILABLE: &'static str = "Placement is not configured for this provider";
    pub const PLACEMENT_TYPE_MISMATCH: &'static str = "Placement type mismatch";
    pub const ADS_ALREADY_IN_PROGRESS: &'static str = "Ads already in progress";
    pub const ADS_DISABLED: &'static str = "Ads are disabled";
    pub const SHOW_TIMED_OUT: &'static str = "Ad show timed out";

    pub fn no_ads_for_placement(placement_id: &str) -> String {
        format!("No ads available for placement: {}", placement_id)
    }

    pub fn no_ads_for_type(kind: PlacementType) -> String {
        format!("No ads available for type: {}", kind)
    }

    pub fn unavailable(kind: PlacementType) -> &'static str {
        match kind {
            PlacementType::Interstitial => Self::INTERSTITIAL_UNAVAILABLE,
            _ => Self::REWARDED_UNAVAILABLE,
        }
    }

    pub fn failed(kind: PlacementType) -> &'static str {
        match kind {
            PlacementType::Interstitial => Self::INTERSTITIAL_FAILED,
            _ => Self::REWARDED_FAILED,
        }
    }
}

/// Outcome of one show request, handed to exactly one caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ShowResult {
    pub placement_id: String,
    pub placement_type: PlacementType,
    pub rewarded: bool,
    pub error: bool,
    pub message: String,
    pub reward_name: String,
    pub reward_amount: f64,
}

impl ShowResult {
    pub fn failure(placement_id: &str, placement_type: PlacementType, message: impl Into<String>) -> Self {
        Self {
            placement_id: placement_id.to_string(),
            placement_type,
            rewarded: false,
            error: true,
            message: message.into(),
            reward_name: String::new(),
            reward_amount: 0.0,
        }
    }

    /// Ad was shown and dismissed without an error.
    pub fn completed(placement_id: &str, placement_type: PlacementType, message: impl Into<String>) -> Self {
        Self {
            error: false,
            ..Self::failure(placement_id, placement_type, message)
        }
    }

    pub fn rewarded(placement_id: &str, reward_name: &str, reward_amount: f64) -> Self {
        let reward_name = if reward_name.is_empty() { placement_id } else { reward_name };
        Self {
            placement_id: placement_id.to_string(),
            placement_type: PlacementType::Rewarded,
            rewarded: true,
            error: false,
            message: AdsMessages::REWARDED.to_string(),
            reward_name: reward_name.to_string(),
            reward_amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewarded_result_falls_back_to_placement_as_reward_name() {
        let result = ShowResult::rewarded("end_of_level", "", 5.0);
        assert!(result.rewarded);
        assert!(!result.error);
        assert_eq!(result.reward_name, "end_of_level");
        assert_eq!(result.reward_amount, 5.0);
    }

    #[test]
    fn completed_result_is_not_an_error_and_not_rewarded() {
        let result = ShowResult::completed("inter", PlacementType::Interstitial, AdsMessages::INTERSTITIAL_CLOSED);
        assert!(!result.error);
        assert!(!result.rewarded);
        assert_eq!(result.message, AdsMessages::INTERSTITIAL_CLOSED);
    }
}
