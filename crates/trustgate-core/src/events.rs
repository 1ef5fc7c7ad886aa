use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AutomationLevel, GateDecision, HealthStatus};

/// Event taxonomy emitted by the gate and the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateEventType {
    TrustGatePass,
    TrustGateHold,
    TrustGateBlock,
    TrustGateOverride,
    RetryAttempt,
    RetriesExhausted,
    ApprovalQueued,
    SettingsChanged,
}

impl GateEventType {
    pub fn for_decision(decision: GateDecision) -> Self {
        match decision {
            GateDecision::Pass => GateEventType::TrustGatePass,
            GateDecision::Hold => GateEventType::TrustGateHold,
            GateDecision::Block => GateEventType::TrustGateBlock,
        }
    }

    /// Hold and block need someone's attention; everything else is informational.
    pub fn is_alert(self) -> bool {
        matches!(self, GateEventType::TrustGateHold | GateEventType::TrustGateBlock)
    }
}

/// Immutable record of one decision or executor outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateEvent {
    #[serde(rename = "type")]
    pub event_type: GateEventType,
    pub timestamp: DateTime<Utc>,
    pub action_id: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<AutomationLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
}

impl GateEvent {
    pub fn new(
        event_type: GateEventType,
        action_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            action_id: action_id.into(),
            reason: reason.into(),
            status: None,
            level: None,
            attempt: None,
        }
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_level(mut self, level: AutomationLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}
