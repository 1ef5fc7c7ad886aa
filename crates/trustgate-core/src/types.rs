#![allow(clippy::doc_markdown)]

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ConfigError;

/// Discrete health status derived from a score and its reported issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Critical,
    Unknown,
}

impl HealthStatus {
    pub const ALL: [HealthStatus; 5] = [
        HealthStatus::Healthy,
        HealthStatus::Degraded,
        HealthStatus::Unhealthy,
        HealthStatus::Critical,
        HealthStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Critical => "critical",
            HealthStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a tenant lets automation act on its own.
///
/// Serialized as the bare integer (`0`, `1`, `2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum AutomationLevel {
    /// Never auto-executes; only surfaces suggestions.
    #[default]
    SuggestOnly,
    /// Executes safe, capped actions while healthy.
    GuardedAuto,
    /// Queues actions for human sign-off instead of executing them.
    ApprovalRequired,
}

impl AutomationLevel {
    pub const ALL: [AutomationLevel; 3] = [
        AutomationLevel::SuggestOnly,
        AutomationLevel::GuardedAuto,
        AutomationLevel::ApprovalRequired,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            AutomationLevel::SuggestOnly => 0,
            AutomationLevel::GuardedAuto => 1,
            AutomationLevel::ApprovalRequired => 2,
        }
    }

    /// Levels at or above guarded-auto are subject to the health gate.
    pub fn is_gated(self) -> bool {
        self >= AutomationLevel::GuardedAuto
    }
}

impl TryFrom<u8> for AutomationLevel {
    type Error = ConfigError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AutomationLevel::SuggestOnly),
            1 => Ok(AutomationLevel::GuardedAuto),
            2 => Ok(AutomationLevel::ApprovalRequired),
            other => Err(ConfigError::InvalidAutomationLevel(u64::from(other))),
        }
    }
}

impl fmt::Display for AutomationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AutomationLevel::SuggestOnly => "suggest-only",
            AutomationLevel::GuardedAuto => "guarded-auto",
            AutomationLevel::ApprovalRequired => "approval-required",
        };
        write!(f, "{} ({label})", self.as_u8())
    }
}

impl Serialize for AutomationLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_u8().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AutomationLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = u64::deserialize(deserializer)?;
        u8::try_from(v)
            .map_err(|_| ConfigError::InvalidAutomationLevel(v))
            .and_then(AutomationLevel::try_from)
            .map_err(serde::de::Error::custom)
    }
}

/// Outcome of one trust gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateDecision {
    /// Execute immediately.
    Pass,
    /// Defer; resumes on its own once health recovers.
    Hold,
    /// Refuse; a human has to clear it.
    Block,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Pass => f.write_str("pass"),
            GateDecision::Hold => f.write_str("hold"),
            GateDecision::Block => f.write_str("block"),
        }
    }
}

/// What a degraded status with reported issues turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPolicy {
    /// Degraded always holds.
    #[default]
    Hold,
    /// Degraded with at least one reported issue blocks.
    BlockOnIssues,
}

/// Retry configuration for one executor invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub exponential_backoff: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn single_attempt() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_delay_ms == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "base_delay_ms must be greater than 0".into(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::InvalidRetryPolicy(format!(
                "max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `n` (1-indexed).
    pub fn delay_for_retry(&self, n: u32) -> Duration {
        if !self.exponential_backoff {
            return Duration::from_millis(self.base_delay_ms);
        }
        let factor = 1u64
            .checked_shl(n.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

/// Raw health signal as delivered by the scoring backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn new(score: Option<f64>, issues: Vec<String>) -> Self {
        Self {
            score,
            issues,
            observed_at: Utc::now(),
        }
    }

    pub fn scored(score: f64) -> Self {
        Self::new(Some(score), Vec::new())
    }

    /// No data received yet.
    pub fn missing() -> Self {
        Self::new(None, Vec::new())
    }
}

/// Classified health: the status plus the advisory issues behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default)]
    pub issues: Vec<String>,
}
