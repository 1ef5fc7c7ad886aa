use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::AutomationLevelSource;
use crate::types::{AutomationLevel, EscalationPolicy, RetryPolicy};

/// Per-tenant automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tenant: String,

    #[serde(default)]
    pub automation_level: AutomationLevel,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,

    #[serde(default)]
    pub escalation: EscalationPolicy,

    /// Issue substrings that demote any status to critical.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub critical_issue_markers: Vec<String>,

    #[serde(default)]
    pub settings_rev: u64,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl TenantSettings {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            automation_level: AutomationLevel::default(),
            retry: RetryPolicy::default(),
            webhook: None,
            escalation: EscalationPolicy::default(),
            critical_issue_markers: Vec::new(),
            settings_rev: 0,
            updated_at: Utc::now(),
        }
    }
}

impl AutomationLevelSource for TenantSettings {
    fn automation_level(&self) -> AutomationLevel {
        self.automation_level
    }
}

/// Outbound webhook target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// Sent verbatim as the `Authorization` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            authorization: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}
