use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
    #[error("invalid automation level {0} (expected 0, 1, or 2)")]
    InvalidAutomationLevel(u64),
}

/// Failure of a single HTTP attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpFailure {
    #[error("HTTP status {status}")]
    Status { status: u16, body: Option<String> },
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("cannot build request: {0}")]
    Request(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HttpFailure {
    pub fn status(status: u16) -> Self {
        HttpFailure::Status { status, body: None }
    }

    /// Client errors are request defects and are not retried, except 429.
    /// Everything else (5xx, timeouts, network) is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpFailure::Status { status, .. } => {
                *status == 429 || !(400..500).contains(status)
            }
            HttpFailure::Timeout | HttpFailure::Network(_) => true,
            HttpFailure::Request(_) | HttpFailure::Serialization(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            HttpFailure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("write failure: {0}")]
    WriteFailure(String),
    #[error("chain corruption at entry {0}")]
    ChainCorruption(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("health provider unavailable: {0}")]
    Unavailable(#[from] HttpFailure),
    #[error("malformed health report: {0}")]
    Malformed(String),
}

/// Structured check result for `tgate check --json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub file: String,
    pub pass: bool,
    pub errors: Vec<CheckIssue>,
    pub warnings: Vec<CheckIssue>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckIssue {
    pub code: String,
    pub check: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl fmt::Display for CheckIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "[{}] {}: {}", self.code, path, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_terminal_except_rate_limit() {
        assert!(!HttpFailure::status(400).is_retryable());
        assert!(!HttpFailure::status(401).is_retryable());
        assert!(!HttpFailure::status(404).is_retryable());
        assert!(!HttpFailure::status(499).is_retryable());
        assert!(HttpFailure::status(429).is_retryable());
    }

    #[test]
    fn server_and_transport_errors_are_retryable() {
        assert!(HttpFailure::status(500).is_retryable());
        assert!(HttpFailure::status(503).is_retryable());
        assert!(HttpFailure::Timeout.is_retryable());
        assert!(HttpFailure::Network("connection refused".into()).is_retryable());
        assert!(!HttpFailure::Serialization("bad".into()).is_retryable());
    }
}
