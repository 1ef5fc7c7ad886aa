//! Webhook delivery for gate events.
//!
//! POSTs JSON to the configured URL. Any 2xx is success; failures follow the
//! [`fetch_with_retry`] classification. `test_connection` makes exactly one
//! attempt so callers get immediate feedback.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use trustgate_core::errors::HttpFailure;
use trustgate_core::events::GateEvent;
use trustgate_core::settings::WebhookConfig;
use trustgate_core::traits::{NoopObserver, RetryObserver};
use trustgate_core::types::RetryPolicy;

use super::http::{fetch_with_retry, send_once};

const AGENT: &str = concat!("trustgate/", env!("CARGO_PKG_VERSION"));

/// Result of a delivered webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub status: u16,
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
    policy: RetryPolicy,
    observer: Arc<dyn RetryObserver>,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.config.url)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, policy: RetryPolicy) -> Result<Self, HttpFailure> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| HttpFailure::Request(e.to_string()))?;
        Ok(Self {
            client,
            config,
            policy,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Deliver a gate event, retrying transient failures.
    pub async fn deliver(&self, event: &GateEvent) -> Result<Delivery, HttpFailure> {
        let body =
            serde_json::to_string(event).map_err(|e| HttpFailure::Serialization(e.to_string()))?;
        self.post_with_retry(body).await
    }

    /// Deliver an arbitrary JSON payload, retrying transient failures.
    pub async fn send_json(&self, payload: &serde_json::Value) -> Result<Delivery, HttpFailure> {
        let body = serde_json::to_string(payload)
            .map_err(|e| HttpFailure::Serialization(e.to_string()))?;
        self.post_with_retry(body).await
    }

    /// Single-attempt connectivity check.
    pub async fn test_connection(&self) -> Result<Delivery, HttpFailure> {
        let payload = serde_json::json!({
            "type": "connectivity_test",
            "timestamp": Utc::now().to_rfc3339(),
        });
        let body = serde_json::to_string(&payload)
            .map_err(|e| HttpFailure::Serialization(e.to_string()))?;
        let response = send_once(&self.request(body)).await?;
        debug!(url = %self.config.url, "webhook connectivity test succeeded");
        Ok(Delivery {
            status: response.status().as_u16(),
        })
    }

    async fn post_with_retry(&self, body: String) -> Result<Delivery, HttpFailure> {
        match fetch_with_retry(self.request(body), &self.policy, self.observer.as_ref()).await {
            Ok(response) => {
                debug!(url = %self.config.url, "webhook delivered");
                Ok(Delivery {
                    status: response.status().as_u16(),
                })
            }
            Err(e) => {
                warn!(url = %self.config.url, error = %e, "webhook delivery failed");
                Err(e)
            }
        }
    }

    fn request(&self, body: String) -> RequestBuilder {
        let mut request = self
            .client
            .post(&self.config.url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, AGENT);
        if let Some(auth) = &self.config.authorization {
            request = request.header(AUTHORIZATION, auth);
        }
        request.body(body)
    }
}
