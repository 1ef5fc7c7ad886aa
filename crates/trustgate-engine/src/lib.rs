#![forbid(unsafe_code)]

pub mod automation;
pub mod exec;
pub mod gates;
pub mod health;
pub mod report;
pub mod state;

pub use automation::{observe, ApprovalQueue, GatedRunner, OutcomeSummary, RunOutcome};
