use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use trustgate_core::types::GateDecision;

use super::decision::{Disposition, GateVerdict};

pub struct OverrideRequest {
    pub action_id: String,
    pub approver: String,
    pub reason: String,
    pub ttl_seconds: i64,
}

/// A human override letting one run of an action through hold or block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideGrant {
    pub action_id: String,
    pub approver: String,
    pub reason: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OverrideGrant {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// `now + ttl_seconds`, saturating at the representable range.
fn expiry(now: DateTime<Utc>, ttl_seconds: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(if ttl_seconds < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

/// Outstanding override grants, keyed by action id. One grant per action.
#[derive(Debug, Default)]
pub struct OverrideLedger {
    grants: Mutex<HashMap<String, OverrideGrant>>,
}

impl OverrideLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant, replacing any earlier grant for the same action.
    pub fn grant(&self, req: &OverrideRequest) -> OverrideGrant {
        let now = Utc::now();
        let grant = OverrideGrant {
            action_id: req.action_id.clone(),
            approver: req.approver.clone(),
            reason: req.reason.clone(),
            granted_at: now,
            expires_at: expiry(now, req.ttl_seconds),
        };
        info!(
            action_id = %grant.action_id,
            approver = %grant.approver,
            ttl_seconds = req.ttl_seconds,
            "override granted"
        );
        self.lock().insert(grant.action_id.clone(), grant.clone());
        grant
    }

    /// Take the grant for `action_id` if one is still valid.
    pub fn consume(&self, action_id: &str) -> Option<OverrideGrant> {
        let grant = self.lock().remove(action_id)?;
        (!grant.is_expired()).then_some(grant)
    }

    /// Remove expired grants, returns the affected action ids.
    pub fn enforce_ttl(&self) -> Vec<String> {
        let mut expired = Vec::new();
        self.lock().retain(|id, g| {
            if g.is_expired() {
                expired.push(id.clone());
                false
            } else {
                true
            }
        });
        expired.sort();
        expired
    }

    pub fn active(&self) -> Vec<OverrideGrant> {
        let mut grants: Vec<OverrideGrant> = self
            .lock()
            .values()
            .filter(|g| !g.is_expired())
            .cloned()
            .collect();
        grants.sort_by(|a, b| a.action_id.cmp(&b.action_id));
        grants
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, OverrideGrant>> {
        self.grants.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Turn a hold/block verdict into an executable one under a human override.
///
/// The grant names its approver, so at approval-required it also stands in
/// for the sign-off: the result is `Execute`, not `AwaitApproval`.
pub fn process_override(verdict: &GateVerdict, grant: &OverrideGrant) -> GateVerdict {
    GateVerdict {
        action_id: verdict.action_id.clone(),
        decision: GateDecision::Pass,
        disposition: Disposition::Execute,
        status: verdict.status,
        level: verdict.level,
        reason: format!(
            "override by {}: {} (was {})",
            grant.approver, grant.reason, verdict.decision
        ),
        is_override: true,
        evaluated_at: Utc::now(),
    }
}
