//! Gated automation: classify health, consult the trust gate, then suggest,
//! queue, withhold or execute the action through the retry loop.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{info, warn};

use trustgate_core::errors::HttpFailure;
use trustgate_core::events::{GateEvent, GateEventType};
use trustgate_core::settings::TenantSettings;
use trustgate_core::traits::{AutomationLevelSource, HealthProvider};
use trustgate_core::types::{AutomationLevel, GateDecision, HealthSnapshot, RetryPolicy};

use crate::exec::{run_with_retry, WebhookNotifier};
use crate::gates::override_gate::process_override;
use crate::gates::{Disposition, GateVerdict, OverrideLedger, TrustGate};
use crate::health::HealthClassifier;
use crate::report::{Reporter, ReportingObserver};

/// What happened to an action handed to [`GatedRunner::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Executed(T),
    Suggested(GateVerdict),
    AwaitingApproval(GateVerdict),
    Held(GateVerdict),
    Blocked(GateVerdict),
}

impl<T> RunOutcome<T> {
    pub fn is_executed(&self) -> bool {
        matches!(self, RunOutcome::Executed(_))
    }

    pub fn verdict(&self) -> Option<&GateVerdict> {
        match self {
            RunOutcome::Executed(_) => None,
            RunOutcome::Suggested(v)
            | RunOutcome::AwaitingApproval(v)
            | RunOutcome::Held(v)
            | RunOutcome::Blocked(v) => Some(v),
        }
    }
}

/// Actions that passed the gate at approval-required, waiting for sign-off.
#[derive(Debug, Default)]
pub struct ApprovalQueue {
    pending: Mutex<BTreeMap<String, GateVerdict>>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a verdict. Re-queuing the same action replaces the older entry.
    pub fn enqueue(&self, verdict: GateVerdict) {
        self.lock().insert(verdict.action_id.clone(), verdict);
    }

    pub fn take(&self, action_id: &str) -> Option<GateVerdict> {
        self.lock().remove(action_id)
    }

    pub fn contains(&self, action_id: &str) -> bool {
        self.lock().contains_key(action_id)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, GateVerdict>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Snapshot from a provider, or a missing snapshot if it is unreachable.
///
/// A missing snapshot classifies as unknown, which blocks every gated level.
pub async fn observe(provider: &dyn HealthProvider) -> HealthSnapshot {
    match provider.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "health provider unavailable; treating health as unknown");
            HealthSnapshot::missing()
        }
    }
}

/// Ties classifier, gate, executor and reporter together for one tenant.
pub struct GatedRunner {
    classifier: HealthClassifier,
    gate: TrustGate,
    policy: RetryPolicy,
    reporter: Reporter,
    notifier: Option<WebhookNotifier>,
    approvals: ApprovalQueue,
    overrides: OverrideLedger,
}

impl fmt::Debug for GatedRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedRunner")
            .field("gate", &self.gate)
            .field("policy", &self.policy)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

impl GatedRunner {
    pub fn new(classifier: HealthClassifier, gate: TrustGate, policy: RetryPolicy) -> Self {
        Self {
            classifier,
            gate,
            policy,
            reporter: Reporter::new(),
            notifier: None,
            approvals: ApprovalQueue::new(),
            overrides: OverrideLedger::new(),
        }
    }

    /// Build from tenant settings, including the webhook notifier if one is
    /// configured.
    pub fn from_settings(settings: &TenantSettings) -> Result<Self, HttpFailure> {
        let mut runner = Self::new(
            HealthClassifier::from_settings(settings),
            TrustGate::from_settings(settings),
            settings.retry,
        );
        if let Some(webhook) = &settings.webhook {
            runner.notifier = Some(WebhookNotifier::new(webhook.clone(), settings.retry)?);
        }
        Ok(runner)
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_notifier(mut self, notifier: WebhookNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn approvals(&self) -> &ApprovalQueue {
        &self.approvals
    }

    pub fn overrides(&self) -> &OverrideLedger {
        &self.overrides
    }

    /// Gate `action` on `snapshot` at the level `level` reports, retrying
    /// every failure.
    pub async fn run<T, E, F, Fut>(
        &self,
        action_id: &str,
        snapshot: &HealthSnapshot,
        level: &dyn AutomationLevelSource,
        action: F,
    ) -> Result<RunOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_classified(action_id, snapshot, level, action, |_: &E| true)
            .await
    }

    /// Like [`run`](Self::run), retrying only errors `is_retryable` accepts.
    pub async fn run_classified<T, E, F, Fut, C>(
        &self,
        action_id: &str,
        snapshot: &HealthSnapshot,
        level: &dyn AutomationLevelSource,
        action: F,
        is_retryable: C,
    ) -> Result<RunOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        C: Fn(&E) -> bool,
    {
        let level = level.automation_level();
        let assessment = self.classifier.assess(snapshot);
        let verdict = self.gate.check(action_id, &assessment, level);

        match verdict.disposition {
            Disposition::Suggest => {
                self.reporter.report(&verdict.event());
                Ok(RunOutcome::Suggested(verdict))
            }
            Disposition::AwaitApproval => {
                self.reporter.report(&verdict.event());
                self.reporter.report(
                    &GateEvent::new(
                        GateEventType::ApprovalQueued,
                        action_id,
                        "awaiting human approval",
                    )
                    .with_status(verdict.status)
                    .with_level(level),
                );
                info!(action_id, "action queued for approval");
                self.approvals.enqueue(verdict.clone());
                Ok(RunOutcome::AwaitingApproval(verdict))
            }
            Disposition::Execute | Disposition::Defer | Disposition::Refuse => {
                self.settle(verdict, action, is_retryable).await
            }
        }
    }

    /// Execute a previously queued action once a human approved it.
    ///
    /// The gate is re-evaluated on the fresh snapshot at guarded-auto; an
    /// approval given while healthy does not carry over into a degraded
    /// period. The approval is consumed either way. Returns `None` when
    /// nothing is pending for `action_id`.
    pub async fn run_approved<T, E, F, Fut>(
        &self,
        action_id: &str,
        snapshot: &HealthSnapshot,
        action: F,
    ) -> Option<Result<RunOutcome<T>, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_approved_classified(action_id, snapshot, action, |_: &E| true)
            .await
    }

    /// Like [`run_approved`](Self::run_approved), retrying only errors
    /// `is_retryable` accepts.
    pub async fn run_approved_classified<T, E, F, Fut, C>(
        &self,
        action_id: &str,
        snapshot: &HealthSnapshot,
        action: F,
        is_retryable: C,
    ) -> Option<Result<RunOutcome<T>, E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        C: Fn(&E) -> bool,
    {
        self.approvals.take(action_id)?;
        let assessment = self.classifier.assess(snapshot);
        let verdict = self
            .gate
            .check(action_id, &assessment, AutomationLevel::GuardedAuto);
        Some(self.settle(verdict, action, is_retryable).await)
    }

    /// Execute on pass, otherwise honour an override or withhold.
    ///
    /// An override grant also covers approval-required: the named approver
    /// is the sign-off, so the action runs without entering the queue.
    async fn settle<T, E, F, Fut, C>(
        &self,
        verdict: GateVerdict,
        action: F,
        is_retryable: C,
    ) -> Result<RunOutcome<T>, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
        C: Fn(&E) -> bool,
    {
        let verdict = if verdict.permits_execution() {
            verdict
        } else {
            match self.overrides.consume(&verdict.action_id) {
                Some(grant) => process_override(&verdict, &grant),
                None => return Ok(self.withhold(verdict).await),
            }
        };

        self.reporter.report(&verdict.event());
        let observer = ReportingObserver::new(self.reporter.clone(), verdict.action_id.clone());
        run_with_retry(&self.policy, &observer, action, is_retryable)
            .await
            .map(RunOutcome::Executed)
    }

    async fn withhold<T>(&self, verdict: GateVerdict) -> RunOutcome<T> {
        let event = verdict.event();
        self.reporter.report(&event);

        if let Some(notifier) = &self.notifier {
            let notifier = notifier.clone().with_observer(Arc::new(ReportingObserver::new(
                self.reporter.clone(),
                event.action_id.clone(),
            )));
            match notifier.deliver(&event).await {
                Ok(delivery) => info!(
                    action_id = %event.action_id,
                    status = delivery.status,
                    "gate event delivered to webhook"
                ),
                Err(e) => warn!(
                    action_id = %event.action_id,
                    error = %e,
                    "webhook delivery failed"
                ),
            }
        }

        if verdict.decision == GateDecision::Hold {
            RunOutcome::Held(verdict)
        } else {
            RunOutcome::Blocked(verdict)
        }
    }
}

/// JSON-friendly summary of an outcome, for the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeSummary {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<GateVerdict>,
}

impl<T> From<&RunOutcome<T>> for OutcomeSummary {
    fn from(outcome: &RunOutcome<T>) -> Self {
        let name = match outcome {
            RunOutcome::Executed(_) => "executed",
            RunOutcome::Suggested(_) => "suggested",
            RunOutcome::AwaitingApproval(_) => "awaiting_approval",
            RunOutcome::Held(_) => "held",
            RunOutcome::Blocked(_) => "blocked",
        };
        Self {
            outcome: name,
            verdict: outcome.verdict().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use trustgate_core::errors::HealthError;
    use trustgate_core::settings::WebhookConfig;
    use trustgate_core::types::{EscalationPolicy, HealthStatus};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::gates::OverrideRequest;
    use crate::health::StaticHealth;
    use crate::report::MemorySink;

    fn runner(sink: &Arc<MemorySink>) -> GatedRunner {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            exponential_backoff: true,
        };
        GatedRunner::new(HealthClassifier::new(), TrustGate::default(), policy)
            .with_reporter(Reporter::new().with_sink(sink.clone()))
    }

    async fn ok_action(calls: &AtomicU32) -> Result<&'static str, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok("published")
    }

    #[tokio::test]
    async fn scores_drive_pass_hold_block_at_guarded_auto() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);

        let mut outcomes = Vec::new();
        for score in [85.0, 55.0, 25.0] {
            let outcome = runner
                .run(
                    "publish",
                    &HealthSnapshot::scored(score),
                    &AutomationLevel::GuardedAuto,
                    || ok_action(&calls),
                )
                .await
                .unwrap();
            outcomes.push(outcome);
        }

        assert_eq!(outcomes[0], RunOutcome::Executed("published"));
        assert!(matches!(outcomes[1], RunOutcome::Held(_)));
        assert!(matches!(outcomes[2], RunOutcome::Blocked(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            sink.types(),
            vec![
                GateEventType::TrustGatePass,
                GateEventType::TrustGateHold,
                GateEventType::TrustGateBlock
            ]
        );
    }

    #[tokio::test]
    async fn suggest_only_never_executes() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);
        for score in [Some(95.0), Some(10.0), None] {
            let outcome = runner
                .run(
                    "draft",
                    &HealthSnapshot::new(score, vec![]),
                    &AutomationLevel::SuggestOnly,
                    || ok_action(&calls),
                )
                .await
                .unwrap();
            assert!(matches!(outcome, RunOutcome::Suggested(_)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_health_blocks_gated_levels() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);
        let outcome = runner
            .run(
                "publish",
                &HealthSnapshot::missing(),
                &AutomationLevel::GuardedAuto,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        let RunOutcome::Blocked(verdict) = outcome else {
            panic!("expected block, got {outcome:?}");
        };
        assert_eq!(verdict.status, HealthStatus::Unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn executed_action_retries_and_reports_attempts() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run(
                "sync",
                &HealthSnapshot::scored(90.0),
                &AutomationLevel::GuardedAuto,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(format!("transient {n}"))
                        } else {
                            Ok(n)
                        }
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::Executed(2));
        assert_eq!(
            sink.types(),
            vec![
                GateEventType::TrustGatePass,
                GateEventType::RetryAttempt,
                GateEventType::RetryAttempt
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);

        let err = runner
            .run(
                "sync",
                &HealthSnapshot::scored(90.0),
                &AutomationLevel::GuardedAuto,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move { Err::<(), _>(format!("failure {n}")) }
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err, "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sink.types().last(), Some(&GateEventType::RetriesExhausted));
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);

        let err = runner
            .run_classified(
                "sync",
                &HealthSnapshot::scored(90.0),
                &AutomationLevel::GuardedAuto,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>(HttpFailure::status(404)) }
                },
                HttpFailure::is_retryable,
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn approval_required_queues_then_runs_on_approval() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);
        let healthy = HealthSnapshot::scored(88.0);

        let outcome = runner
            .run(
                "budget",
                &healthy,
                &AutomationLevel::ApprovalRequired,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::AwaitingApproval(_)));
        assert!(runner.approvals().contains("budget"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let approved = runner
            .run_approved("budget", &healthy, || ok_action(&calls))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(approved, RunOutcome::Executed("published"));
        assert!(!runner.approvals().contains("budget"));
        assert_eq!(
            sink.types(),
            vec![
                GateEventType::TrustGatePass,
                GateEventType::ApprovalQueued,
                GateEventType::TrustGatePass
            ]
        );
    }

    #[tokio::test]
    async fn approval_is_regated_on_fresh_health() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);

        runner
            .run(
                "budget",
                &HealthSnapshot::scored(88.0),
                &AutomationLevel::ApprovalRequired,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        let outcome = runner
            .run_approved("budget", &HealthSnapshot::scored(50.0), || ok_action(&calls))
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Held(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_approved_without_pending_is_none() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);
        assert!(runner
            .run_approved("nothing", &HealthSnapshot::scored(90.0), || ok_action(&calls))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn override_lets_one_blocked_run_through() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);
        let unhealthy = HealthSnapshot::scored(20.0);

        runner.overrides().grant(&OverrideRequest {
            action_id: "hotfix".into(),
            approver: "ops-lead".into(),
            reason: "incident".into(),
            ttl_seconds: 600,
        });

        let first = runner
            .run("hotfix", &unhealthy, &AutomationLevel::GuardedAuto, || {
                ok_action(&calls)
            })
            .await
            .unwrap();
        assert!(first.is_executed());

        let second = runner
            .run("hotfix", &unhealthy, &AutomationLevel::GuardedAuto, || {
                ok_action(&calls)
            })
            .await
            .unwrap();
        assert!(matches!(second, RunOutcome::Blocked(_)));
        assert_eq!(
            sink.types(),
            vec![
                GateEventType::TrustGateOverride,
                GateEventType::TrustGateBlock
            ]
        );
    }

    #[tokio::test]
    async fn override_at_approval_required_runs_without_queueing() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);

        runner.overrides().grant(&OverrideRequest {
            action_id: "budget".into(),
            approver: "cfo".into(),
            reason: "quarter close".into(),
            ttl_seconds: 600,
        });

        let outcome = runner
            .run(
                "budget",
                &HealthSnapshot::scored(30.0),
                &AutomationLevel::ApprovalRequired,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Executed("published"));
        assert!(!runner.approvals().contains("budget"));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, GateEventType::TrustGateOverride);
        assert_eq!(events[0].level, Some(AutomationLevel::ApprovalRequired));
        assert!(events[0].reason.contains("override by cfo"));
    }

    #[tokio::test]
    async fn level_is_read_from_settings_on_each_run() {
        let sink = Arc::new(MemorySink::new());
        let runner = runner(&sink);
        let calls = AtomicU32::new(0);
        let healthy = HealthSnapshot::scored(90.0);

        let mut settings = TenantSettings::new("acme");
        let first = runner
            .run("publish", &healthy, &settings, || ok_action(&calls))
            .await
            .unwrap();
        assert!(matches!(first, RunOutcome::Suggested(_)));

        settings.automation_level = AutomationLevel::GuardedAuto;
        let second = runner
            .run("publish", &healthy, &settings, || ok_action(&calls))
            .await
            .unwrap();
        assert!(second.is_executed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn escalation_policy_blocks_degraded_with_issues() {
        let sink = Arc::new(MemorySink::new());
        let runner = GatedRunner::new(
            HealthClassifier::new(),
            TrustGate::new(EscalationPolicy::BlockOnIssues),
            RetryPolicy::single_attempt(),
        )
        .with_reporter(Reporter::new().with_sink(sink.clone()));
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run(
                "publish",
                &HealthSnapshot::new(Some(55.0), vec!["latency spike".into()]),
                &AutomationLevel::GuardedAuto,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Blocked(_)));
    }

    #[tokio::test]
    async fn withheld_event_is_delivered_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gate"))
            .and(body_partial_json(serde_json::json!({
                "type": "trust_gate_block",
                "action_id": "publish"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let notifier = WebhookNotifier::new(
            WebhookConfig::new(format!("{}/gate", server.uri())),
            RetryPolicy::single_attempt(),
        )
        .unwrap();
        let runner = runner(&sink).with_notifier(notifier);
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run(
                "publish",
                &HealthSnapshot::scored(10.0),
                &AutomationLevel::GuardedAuto,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Blocked(_)));
    }

    #[tokio::test]
    async fn withheld_delivery_retries_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 10,
            max_delay_ms: 20,
            exponential_backoff: true,
        };
        let notifier = WebhookNotifier::new(WebhookConfig::new(server.uri()), policy).unwrap();
        let runner = runner(&sink).with_notifier(notifier);
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run(
                "publish",
                &HealthSnapshot::scored(50.0),
                &AutomationLevel::GuardedAuto,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Held(_)));

        let events = sink.events();
        assert_eq!(
            sink.types(),
            vec![GateEventType::TrustGateHold, GateEventType::RetryAttempt]
        );
        assert_eq!(events[1].action_id, "publish");
        assert!(events[1].reason.contains("503"));
    }

    #[tokio::test]
    async fn webhook_failure_does_not_change_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let notifier = WebhookNotifier::new(
            WebhookConfig::new(server.uri()),
            RetryPolicy::single_attempt(),
        )
        .unwrap();
        let runner = runner(&sink).with_notifier(notifier);
        let calls = AtomicU32::new(0);

        let outcome = runner
            .run(
                "publish",
                &HealthSnapshot::scored(50.0),
                &AutomationLevel::GuardedAuto,
                || ok_action(&calls),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Held(_)));
        assert_eq!(sink.types(), vec![GateEventType::TrustGateHold]);
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl HealthProvider for Unreachable {
        async fn snapshot(&self) -> Result<HealthSnapshot, HealthError> {
            Err(HealthError::Unavailable(HttpFailure::Timeout))
        }
    }

    #[tokio::test]
    async fn unreachable_provider_observes_missing_health() {
        let snapshot = observe(&Unreachable).await;
        assert!(snapshot.score.is_none());

        let fixed = observe(&StaticHealth(HealthSnapshot::scored(72.0))).await;
        assert_eq!(fixed.score, Some(72.0));
    }

    #[test]
    fn outcome_summary_names() {
        let summary = OutcomeSummary::from(&RunOutcome::Executed(()));
        assert_eq!(summary.outcome, "executed");
        assert!(summary.verdict.is_none());
    }
}
