use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use trustgate_core::errors::{HealthError, HttpFailure};
use trustgate_core::traits::{HealthProvider, NoopObserver, RetryObserver};
use trustgate_core::types::{HealthSnapshot, RetryPolicy};

use crate::exec::fetch_with_retry;

/// Fixed snapshot, for tests and for scores passed on the command line.
#[derive(Debug, Clone)]
pub struct StaticHealth(pub HealthSnapshot);

#[async_trait]
impl HealthProvider for StaticHealth {
    async fn snapshot(&self) -> Result<HealthSnapshot, HealthError> {
        Ok(self.0.clone())
    }
}

/// Wire format of the scoring backend's health report.
#[derive(Debug, Deserialize)]
struct HealthReport {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    issues: Vec<String>,
}

/// Polls the scoring backend over HTTP.
pub struct HttpHealthProvider {
    client: Client,
    url: String,
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl HttpHealthProvider {
    pub fn new(url: impl Into<String>, policy: RetryPolicy) -> Result<Self, HealthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpFailure::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            policy,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait]
impl HealthProvider for HttpHealthProvider {
    async fn snapshot(&self) -> Result<HealthSnapshot, HealthError> {
        let response = fetch_with_retry(
            self.client.get(&self.url),
            &self.policy,
            self.observer.as_ref(),
        )
        .await?;
        let report: HealthReport = response
            .json()
            .await
            .map_err(|e| HealthError::Malformed(e.to_string()))?;
        Ok(HealthSnapshot {
            score: report.score,
            issues: report.issues,
            observed_at: Utc::now(),
        })
    }
}
