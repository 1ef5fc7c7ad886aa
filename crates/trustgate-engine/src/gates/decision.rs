use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trustgate_core::events::{GateEvent, GateEventType};
use trustgate_core::types::{AutomationLevel, GateDecision, HealthStatus};

/// What the caller does with the action after a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Run it now.
    Execute,
    /// Surface it as a suggestion; suggest-only never auto-runs.
    Suggest,
    /// Queue it for human sign-off.
    AwaitApproval,
    /// Skip this cycle; resumes once health recovers.
    Defer,
    /// Refuse until a human clears the block.
    Refuse,
}

impl Disposition {
    pub fn resolve(decision: GateDecision, level: AutomationLevel) -> Self {
        match (level, decision) {
            (AutomationLevel::SuggestOnly, _) => Disposition::Suggest,
            (_, GateDecision::Hold) => Disposition::Defer,
            (_, GateDecision::Block) => Disposition::Refuse,
            (AutomationLevel::GuardedAuto, GateDecision::Pass) => Disposition::Execute,
            (AutomationLevel::ApprovalRequired, GateDecision::Pass) => Disposition::AwaitApproval,
        }
    }
}

/// Record of one gate evaluation for a specific action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub action_id: String,
    pub decision: GateDecision,
    pub disposition: Disposition,
    pub status: HealthStatus,
    pub level: AutomationLevel,
    pub reason: String,
    pub is_override: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl GateVerdict {
    pub fn permits_execution(&self) -> bool {
        self.disposition == Disposition::Execute
    }

    pub fn event_type(&self) -> GateEventType {
        if self.is_override {
            GateEventType::TrustGateOverride
        } else {
            GateEventType::for_decision(self.decision)
        }
    }

    pub fn event(&self) -> GateEvent {
        GateEvent {
            event_type: self.event_type(),
            timestamp: self.evaluated_at,
            action_id: self.action_id.clone(),
            reason: self.reason.clone(),
            status: Some(self.status),
            level: Some(self.level),
            attempt: None,
        }
    }
}
