use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{HealthError, ReportError};
use crate::events::GateEvent;
use crate::types::{AutomationLevel, HealthSnapshot};

/// Supplies the latest health signal for gate evaluation.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    async fn snapshot(&self) -> Result<HealthSnapshot, HealthError>;
}

/// Supplies the tenant's configured automation level.
///
/// Read once per gate evaluation, so a source backed by live settings picks
/// up level changes between runs.
pub trait AutomationLevelSource: Send + Sync {
    fn automation_level(&self) -> AutomationLevel;
}

/// A fixed level.
impl AutomationLevelSource for AutomationLevel {
    fn automation_level(&self) -> AutomationLevel {
        *self
    }
}

/// Receives gate and executor events for persistence or display.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &GateEvent) -> Result<(), ReportError>;
}

/// Observes executor progress without touching its control flow.
///
/// Both hooks default to no-ops.
pub trait RetryObserver: Send + Sync {
    /// Called after failed attempt `attempt` (1-indexed), before sleeping `delay`.
    fn on_retry(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration) {
        let _ = (attempt, error, delay);
    }

    /// Called once when the final allowed attempt has failed.
    fn on_max_retries_reached(&self, error: &dyn fmt::Display) {
        let _ = error;
    }
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {}

/// Session-scoped boolean flags (dismissed alerts, shown-once banners).
pub trait FlagStore: Send + Sync {
    fn get(&self, key: &str) -> bool;
    fn set(&self, key: &str) -> anyhow::Result<()>;
    fn clear(&self, key: &str) -> anyhow::Result<()>;
    fn clear_all(&self) -> anyhow::Result<()>;
    fn keys(&self) -> Vec<String>;
}
