use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, warn};

use trustgate_core::traits::{NoopObserver, RetryObserver};
use trustgate_core::types::RetryPolicy;

pub type ActionFuture<T, E> = BoxFuture<'static, Result<T, E>>;
type SharedAction<T, E> = Arc<dyn Fn() -> ActionFuture<T, E> + Send + Sync>;
type Classifier<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Progress of one executor invocation, for UI feedback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryState {
    /// Retries performed so far (0 while on the first attempt).
    pub attempt: u32,
    pub last_error: Option<String>,
    pub is_retrying: bool,
}

/// Run `action` under `policy`, retrying every failure `is_retryable` accepts.
///
/// Attempts are strictly sequential. The only suspend points are the action
/// itself and the backoff sleep. On exhaustion the last error is returned.
pub async fn run_with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    observer: &dyn RetryObserver,
    action: F,
    is_retryable: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    C: Fn(&E) -> bool,
{
    attempt_loop(policy, observer, action, is_retryable, &|_: &RetryState| {}).await
}

async fn attempt_loop<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    observer: &dyn RetryObserver,
    mut action: F,
    is_retryable: C,
    publish: &(dyn Fn(&RetryState) + Send + Sync),
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    C: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts();
    let mut state = RetryState::default();

    loop {
        let attempt_no = state.attempt + 1;
        debug!(attempt = attempt_no, max_attempts, "attempting action");

        let delay = match action().await {
            Ok(value) => {
                state.is_retrying = false;
                publish(&state);
                return Ok(value);
            }
            Err(err) => {
                state.last_error = Some(err.to_string());

                if !is_retryable(&err) {
                    warn!(attempt = attempt_no, error = %err, "terminal failure, not retrying");
                    state.is_retrying = false;
                    publish(&state);
                    return Err(err);
                }

                if attempt_no >= max_attempts {
                    warn!(attempts = attempt_no, error = %err, "retries exhausted");
                    observer.on_max_retries_reached(&err);
                    state.is_retrying = false;
                    publish(&state);
                    return Err(err);
                }

                let delay = policy.delay_for_retry(attempt_no);
                warn!(
                    attempt = attempt_no,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed, backing off"
                );
                state.attempt = attempt_no;
                state.is_retrying = true;
                observer.on_retry(attempt_no, &err, delay);
                publish(&state);
                delay
            }
        };

        tokio::time::sleep(delay).await;
    }
}

/// Bound a future by an overall deadline.
///
/// The executor imposes no end-to-end timeout of its own.
pub async fn with_deadline<F: Future>(
    deadline: Duration,
    fut: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    tokio::time::timeout(deadline, fut).await
}

struct Inner<T, E> {
    state: RetryState,
    last_action: Option<SharedAction<T, E>>,
    /// Bumped by every execute/retry/reset; stale invocations stop publishing.
    generation: u64,
}

/// Stateful retry handle: remembers the last action for `retry()` and exposes
/// the latest invocation's `RetryState`.
///
/// Each `execute` still keeps its own attempt counter; the handle only
/// mirrors the most recent invocation.
pub struct ResilientExecutor<T, E> {
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
    classify: Classifier<E>,
    inner: Mutex<Inner<T, E>>,
}

impl<T, E> ResilientExecutor<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            observer: Arc::new(NoopObserver),
            classify: Arc::new(|_: &E| true),
            inner: Mutex::new(Inner {
                state: RetryState::default(),
                last_action: None,
                generation: 0,
            }),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Restrict retries to errors the predicate accepts.
    pub fn with_classifier<C>(mut self, classify: C) -> Self
    where
        C: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.classify = Arc::new(classify);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> RetryState {
        self.lock().state.clone()
    }

    pub async fn execute<F, Fut>(&self, action: F) -> Result<T, E>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let shared: SharedAction<T, E> = Arc::new(move || action().boxed());
        let generation = self.begin(Some(shared.clone()));
        self.run(shared, generation).await
    }

    /// Re-run the most recent action with fresh counters.
    ///
    /// Returns `None` when there is nothing to retry.
    pub async fn retry(&self) -> Option<Result<T, E>> {
        let action = self.lock().last_action.clone()?;
        let generation = self.begin(None);
        Some(self.run(action, generation).await)
    }

    /// Forget the last action and clear all progress.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = RetryState::default();
        inner.last_action = None;
        inner.generation = inner.generation.wrapping_add(1);
    }

    fn begin(&self, action: Option<SharedAction<T, E>>) -> u64 {
        let mut inner = self.lock();
        if let Some(action) = action {
            inner.last_action = Some(action);
        }
        inner.state = RetryState::default();
        inner.generation = inner.generation.wrapping_add(1);
        inner.generation
    }

    async fn run(&self, action: SharedAction<T, E>, generation: u64) -> Result<T, E> {
        let classify = self.classify.clone();
        let publish = |state: &RetryState| {
            let mut inner = self.lock();
            if inner.generation == generation {
                inner.state = state.clone();
            }
        };
        attempt_loop(
            &self.policy,
            self.observer.as_ref(),
            || action(),
            move |e: &E| classify(e),
            &publish,
        )
        .await
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
