use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::actions::{ActionEvent, ActionKind};
use crate::model::placements::PlacementType;

/// **广告行为日志**（一行 JSON）
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActionRecord {
    pub record_id: Uuid,
    pub timestamp: String,
    pub log_type: String,
    pub placement_id: String,
    pub placement_type: PlacementType,
    pub action: ActionKind,
    pub sdk_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default)]
    pub error_code: i32,
}

impl ActionRecord {
    pub fn from_event(event: &ActionEvent) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now().to_rfc3339(),
            log_type: "ads_action".to_string(),
            placement_id: event.placement_id.clone(),
            placement_type: event.placement_type,
            action: event.action,
            sdk_name: event.sdk_name.clone(),
            message: event.message.clone(),
            error_code: event.error_code,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.action.is_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_copies_event_fields() {
        let event = ActionEvent::new("reward1", PlacementType::Rewarded, ActionKind::Failed, "admob")
            .with_message("No fill")
            .with_error_code(3);
        let record = ActionRecord::from_event(&event);

        assert!(record.is_failure());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "failed");
        assert_eq!(json["placement_type"], "rewarded");
        assert_eq!(json["error_code"], 3);
        assert_eq!(json["message"], "No fill");
    }

    #[test]
    fn empty_message_is_omitted() {
        let event = ActionEvent::new("inter1", PlacementType::Interstitial, ActionKind::Opened, "sim");
        let json = serde_json::to_value(ActionRecord::from_event(&event)).unwrap();
        assert!(json.get("message").is_none());
    }
}
