use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use trustgate_core::errors::ReportError;
use trustgate_core::events::{GateEvent, GateEventType};
use trustgate_core::traits::{EventSink, FlagStore};

fn dismissed_key(action_id: &str) -> String {
    format!("alert-dismissed:{action_id}")
}

/// An open hold/block alert for one action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub action_id: String,
    pub event_type: GateEventType,
    pub reason: String,
}

/// Tracks the latest hold/block per action for a notification surface.
///
/// Dismissals live in the injected [`FlagStore`]. A pass for the action
/// resolves the alert and clears its dismissal, so the next hold or block
/// shows up again.
pub struct GateAlerts {
    flags: Arc<dyn FlagStore>,
    open: Mutex<BTreeMap<String, Alert>>,
}

impl GateAlerts {
    pub fn new(flags: Arc<dyn FlagStore>) -> Self {
        Self {
            flags,
            open: Mutex::new(BTreeMap::new()),
        }
    }

    /// Visible alerts, excluding dismissed ones.
    pub fn visible(&self) -> Vec<Alert> {
        self.lock()
            .values()
            .filter(|a| !self.flags.get(&dismissed_key(&a.action_id)))
            .cloned()
            .collect()
    }

    pub fn dismiss(&self, action_id: &str) -> anyhow::Result<()> {
        self.flags.set(&dismissed_key(action_id))
    }

    pub fn is_dismissed(&self, action_id: &str) -> bool {
        self.flags.get(&dismissed_key(action_id))
    }

    /// Rebuild open alerts from a logged history without touching dismissals.
    pub fn restore<'a>(&self, events: impl IntoIterator<Item = &'a GateEvent>) {
        for event in events {
            self.track(event);
        }
    }

    /// Update the open set; returns true when the event resolved an alert.
    fn track(&self, event: &GateEvent) -> bool {
        match event.event_type {
            t if t.is_alert() => {
                self.lock().insert(
                    event.action_id.clone(),
                    Alert {
                        action_id: event.action_id.clone(),
                        event_type: t,
                        reason: event.reason.clone(),
                    },
                );
                false
            }
            GateEventType::TrustGatePass | GateEventType::TrustGateOverride => {
                self.lock().remove(&event.action_id);
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Alert>> {
        self.open.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventSink for GateAlerts {
    fn record(&self, event: &GateEvent) -> Result<(), ReportError> {
        if self.track(event) {
            self.flags
                .clear(&dismissed_key(&event.action_id))
                .map_err(|e| ReportError::WriteFailure(format!("{e:#}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::flags::MemoryFlagStore;

    fn alerts() -> GateAlerts {
        GateAlerts::new(Arc::new(MemoryFlagStore::new()))
    }

    #[test]
    fn hold_and_block_open_alerts() {
        let alerts = alerts();
        alerts
            .record(&GateEvent::new(GateEventType::TrustGateHold, "a", "degraded"))
            .unwrap();
        alerts
            .record(&GateEvent::new(GateEventType::TrustGateBlock, "b", "unhealthy"))
            .unwrap();
        let visible = alerts.visible();
        assert_eq!(visible.len(), 2);
        assert_eq!(visible[0].event_type, GateEventType::TrustGateHold);
        assert_eq!(visible[1].event_type, GateEventType::TrustGateBlock);
    }

    #[test]
    fn dismissed_alert_is_hidden_until_pass() {
        let alerts = alerts();
        let hold = GateEvent::new(GateEventType::TrustGateHold, "a", "degraded");
        alerts.record(&hold).unwrap();
        alerts.dismiss("a").unwrap();
        assert!(alerts.visible().is_empty());

        // Still dismissed while the hold persists.
        alerts.record(&hold).unwrap();
        assert!(alerts.visible().is_empty());

        alerts
            .record(&GateEvent::new(GateEventType::TrustGatePass, "a", "healthy"))
            .unwrap();
        assert!(!alerts.is_dismissed("a"));

        alerts.record(&hold).unwrap();
        assert_eq!(alerts.visible().len(), 1);
    }

    #[test]
    fn restore_keeps_later_dismissal() {
        let flags = Arc::new(MemoryFlagStore::new());
        let history = vec![
            GateEvent::new(GateEventType::TrustGateHold, "a", "degraded"),
            GateEvent::new(GateEventType::TrustGatePass, "a", "healthy"),
            GateEvent::new(GateEventType::TrustGateBlock, "a", "unhealthy"),
            GateEvent::new(GateEventType::TrustGateHold, "b", "degraded"),
        ];
        flags.set(&dismissed_key("a")).unwrap();

        let alerts = GateAlerts::new(flags);
        alerts.restore(&history);
        let visible = alerts.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].action_id, "b");
        assert!(alerts.is_dismissed("a"));
    }

    #[test]
    fn executor_events_do_not_open_alerts() {
        let alerts = alerts();
        alerts
            .record(&GateEvent::new(GateEventType::RetryAttempt, "a", "retrying"))
            .unwrap();
        assert!(alerts.visible().is_empty());
    }
}
