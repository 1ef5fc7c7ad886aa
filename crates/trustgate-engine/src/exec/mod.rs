pub mod executor;
pub mod http;
pub mod webhook;

pub use executor::{run_with_retry, with_deadline, ResilientExecutor, RetryState};
pub use http::fetch_with_retry;
pub use webhook::WebhookNotifier;
