use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::warn;

use trustgate_core::errors::ReportError;
use trustgate_core::events::{GateEvent, GateEventType};
use trustgate_core::traits::{EventSink, RetryObserver};

use super::event_log::append_event;

/// Fans events out to every registered sink.
///
/// A failing sink is logged and skipped; reporting never changes a gate
/// decision or an action's outcome.
#[derive(Clone, Default)]
pub struct Reporter {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn report(&self, event: &GateEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                warn!(
                    action_id = %event.action_id,
                    error = %e,
                    "event sink failed; continuing"
                );
            }
        }
    }
}

/// In-process sink, e.g. for a notification badge.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<GateEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GateEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn types(&self) -> Vec<GateEventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &GateEvent) -> Result<(), ReportError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

/// Hash-chained JSONL file sink.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    fn record(&self, event: &GateEvent) -> Result<(), ReportError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        append_event(&self.path, event)
            .map(|_| ())
            .map_err(|e| ReportError::WriteFailure(format!("{e:#}")))
    }
}

/// Bridges executor callbacks into `retry_attempt` / `retries_exhausted`
/// events for one action.
#[derive(Debug, Clone)]
pub struct ReportingObserver {
    reporter: Reporter,
    action_id: String,
}

impl ReportingObserver {
    pub fn new(reporter: Reporter, action_id: impl Into<String>) -> Self {
        Self {
            reporter,
            action_id: action_id.into(),
        }
    }
}

impl RetryObserver for ReportingObserver {
    fn on_retry(&self, attempt: u32, error: &dyn fmt::Display, delay: Duration) {
        let event = GateEvent::new(
            GateEventType::RetryAttempt,
            self.action_id.clone(),
            format!("attempt {attempt} failed: {error}; retrying in {}ms", delay.as_millis()),
        )
        .with_attempt(attempt);
        self.reporter.report(&event);
    }

    fn on_max_retries_reached(&self, error: &dyn fmt::Display) {
        let event = GateEvent::new(
            GateEventType::RetriesExhausted,
            self.action_id.clone(),
            format!("retries exhausted: {error}"),
        );
        self.reporter.report(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::event_log::{read_events, verify_chain};

    struct FailingSink;

    impl EventSink for FailingSink {
        fn record(&self, _event: &GateEvent) -> Result<(), ReportError> {
            Err(ReportError::WriteFailure("disk full".into()))
        }
    }

    #[test]
    fn failing_sink_does_not_stop_others() {
        let memory = Arc::new(MemorySink::new());
        let reporter = Reporter::new()
            .with_sink(Arc::new(FailingSink))
            .with_sink(memory.clone());
        reporter.report(&GateEvent::new(GateEventType::TrustGatePass, "a", "ok"));
        assert_eq!(memory.types(), vec![GateEventType::TrustGatePass]);
    }

    #[test]
    fn jsonl_sink_appends_chained_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.events.jsonl");
        let sink = JsonlSink::new(&path);
        sink.record(&GateEvent::new(GateEventType::TrustGateHold, "a", "degraded"))
            .unwrap();
        sink.record(&GateEvent::new(GateEventType::TrustGatePass, "a", "healthy"))
            .unwrap();
        assert_eq!(verify_chain(&path).unwrap(), 2);
        assert_eq!(read_events(&path).unwrap()[0].reason, "degraded");
    }

    #[test]
    fn separate_sinks_on_one_log_share_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme.events.jsonl");

        let handles: Vec<_> = (0..2)
            .map(|n| {
                let sink = JsonlSink::new(&path);
                std::thread::spawn(move || {
                    for i in 0..20 {
                        let action = format!("sink{n}-{i}");
                        sink.record(&GateEvent::new(GateEventType::TrustGateHold, action, "x"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(verify_chain(&path).unwrap(), 40);
    }

    #[test]
    fn jsonl_sink_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("missing/dir/events.jsonl"));
        let err = sink
            .record(&GateEvent::new(GateEventType::TrustGatePass, "a", "ok"))
            .unwrap_err();
        assert!(matches!(err, ReportError::WriteFailure(_)));
    }

    #[test]
    fn observer_emits_retry_and_exhausted_events() {
        let memory = Arc::new(MemorySink::new());
        let observer =
            ReportingObserver::new(Reporter::new().with_sink(memory.clone()), "webhook-1");
        observer.on_retry(1, &"HTTP status 503", Duration::from_millis(1000));
        observer.on_max_retries_reached(&"HTTP status 503");

        let events = memory.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, GateEventType::RetryAttempt);
        assert_eq!(events[0].attempt, Some(1));
        assert!(events[0].reason.contains("1000ms"));
        assert_eq!(events[1].event_type, GateEventType::RetriesExhausted);
        assert_eq!(events[1].action_id, "webhook-1");
    }
}
