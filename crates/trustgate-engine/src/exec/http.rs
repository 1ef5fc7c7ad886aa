//! HTTP flavour of the resilient executor.
//!
//! Adds failure classification on top of [`run_with_retry`]: non-2xx
//! responses in `[400, 500)` are terminal except 429; 5xx, other non-2xx,
//! timeouts and network errors are retried.

use reqwest::{RequestBuilder, Response};

use trustgate_core::errors::HttpFailure;
use trustgate_core::traits::RetryObserver;
use trustgate_core::types::RetryPolicy;

use super::executor::run_with_retry;

const MAX_ERROR_BODY: usize = 512;

/// Send `request` with retry. The builder is cloned for every attempt.
pub async fn fetch_with_retry(
    request: RequestBuilder,
    policy: &RetryPolicy,
    observer: &dyn RetryObserver,
) -> Result<Response, HttpFailure> {
    run_with_retry(
        policy,
        observer,
        || send_once(&request),
        HttpFailure::is_retryable,
    )
    .await
}

/// Exactly one attempt, same success/failure mapping as [`fetch_with_retry`].
pub async fn send_once(request: &RequestBuilder) -> Result<Response, HttpFailure> {
    let request = request
        .try_clone()
        .ok_or_else(|| HttpFailure::Request("request body cannot be cloned".into()))?;
    let response = request.send().await.map_err(map_transport_error)?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .ok()
        .filter(|b| !b.is_empty())
        .map(|mut b| {
            if b.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !b.is_char_boundary(cut) {
                    cut -= 1;
                }
                b.truncate(cut);
            }
            b
        });
    Err(HttpFailure::Status {
        status: status.as_u16(),
        body,
    })
}

fn map_transport_error(e: reqwest::Error) -> HttpFailure {
    if e.is_timeout() {
        HttpFailure::Timeout
    } else if e.is_builder() {
        HttpFailure::Request(e.to_string())
    } else {
        HttpFailure::Network(e.to_string())
    }
}
