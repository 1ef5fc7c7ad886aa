use chrono::Utc;
use tracing::{debug, info};

use trustgate_core::settings::TenantSettings;
use trustgate_core::types::{
    AutomationLevel, EscalationPolicy, GateDecision, HealthAssessment, HealthStatus,
};

use super::decision::{Disposition, GateVerdict};

/// Health-based trust gate.
///
/// Decision table for gated levels (guarded-auto and approval-required):
/// - healthy → pass
/// - degraded → hold (block under `BlockOnIssues` when issues are reported)
/// - unhealthy, critical, unknown → block
///
/// Suggest-only always passes: nothing auto-runs at that level, so nothing
/// needs gating. Decisions are recomputed on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustGate {
    escalation: EscalationPolicy,
}

impl TrustGate {
    pub fn new(escalation: EscalationPolicy) -> Self {
        Self { escalation }
    }

    pub fn from_settings(settings: &TenantSettings) -> Self {
        Self::new(settings.escalation)
    }

    pub fn evaluate(&self, status: HealthStatus, level: AutomationLevel) -> GateDecision {
        if !level.is_gated() {
            return GateDecision::Pass;
        }
        match status {
            HealthStatus::Healthy => GateDecision::Pass,
            HealthStatus::Degraded => GateDecision::Hold,
            HealthStatus::Unhealthy | HealthStatus::Critical | HealthStatus::Unknown => {
                GateDecision::Block
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate), with the escalation policy applied
    /// to the assessment's issues.
    pub fn evaluate_assessment(
        &self,
        assessment: &HealthAssessment,
        level: AutomationLevel,
    ) -> GateDecision {
        let decision = self.evaluate(assessment.status, level);
        if decision == GateDecision::Hold && self.escalates(assessment) {
            return GateDecision::Block;
        }
        decision
    }

    pub fn is_blocked(&self, status: HealthStatus, level: AutomationLevel) -> bool {
        self.evaluate(status, level) == GateDecision::Block
    }

    /// Evaluate for a specific action and describe the outcome.
    pub fn check(
        &self,
        action_id: &str,
        assessment: &HealthAssessment,
        level: AutomationLevel,
    ) -> GateVerdict {
        let decision = self.evaluate_assessment(assessment, level);
        let reason = self.reason(decision, assessment, level);
        let verdict = GateVerdict {
            action_id: action_id.to_string(),
            decision,
            disposition: Disposition::resolve(decision, level),
            status: assessment.status,
            level,
            reason,
            is_override: false,
            evaluated_at: Utc::now(),
        };

        match decision {
            GateDecision::Pass => debug!(
                action_id,
                status = %assessment.status,
                level = level.as_u8(),
                "trust gate pass"
            ),
            GateDecision::Hold | GateDecision::Block => info!(
                action_id,
                decision = %decision,
                status = %assessment.status,
                level = level.as_u8(),
                reason = %verdict.reason,
                "trust gate withheld automation"
            ),
        }
        verdict
    }

    fn escalates(&self, assessment: &HealthAssessment) -> bool {
        self.escalation == EscalationPolicy::BlockOnIssues && !assessment.issues.is_empty()
    }

    fn reason(
        &self,
        decision: GateDecision,
        assessment: &HealthAssessment,
        level: AutomationLevel,
    ) -> String {
        if !level.is_gated() {
            return "suggest-only: nothing auto-executes".to_string();
        }
        let status = assessment.status;
        match decision {
            GateDecision::Pass => format!("health {status}: automation permitted"),
            GateDecision::Hold => {
                "health degraded: deferred until health recovers".to_string()
            }
            GateDecision::Block if status == HealthStatus::Degraded => format!(
                "health degraded with {} reported issue(s): escalated to block",
                assessment.issues.len()
            ),
            GateDecision::Block if status == HealthStatus::Unknown => {
                "no health data: automation blocked".to_string()
            }
            GateDecision::Block => format!(
                "health {status}: blocked until health recovers or a human override clears it"
            ),
        }
    }
}
