// src/model/actions.rs

use serde::{Deserialize, Serialize};

use crate::model::placements::PlacementType;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Requested,
    Opened,
    Clicked,
    Rewarded,
    Closed,
    Failed,
    Available,
    Unavailable,
}

impl ActionKind {
    /// Whether this action ends the lifecycle of a show request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActionKind::Rewarded | ActionKind::Closed | ActionKind::Failed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionKind::Failed | ActionKind::Unavailable)
    }
}

/// Fine-grained lifecycle notification broadcast by every ads service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub placement_id: String,
    pub placement_type: PlacementType,
    pub action: ActionKind,
    pub message: String,
    pub error_code: i32,
    pub sdk_name: String,
}

impl ActionEvent {
    pub fn new(placement_id: &str, placement_type: PlacementType, action: ActionKind, sdk_name: &str) -> Self {
        Self {
            placement_id: placement_id.to_string(),
            placement_type,
            action,
            message: String::new(),
            error_code: 0,
            sdk_name: sdk_name.to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_error_code(mut self, error_code: i32) -> Self {
        self.error_code = error_code;
        self
    }
}
