pub mod alerts;
pub mod event_log;
pub mod reporter;

pub use alerts::{Alert, GateAlerts};
pub use reporter::{JsonlSink, MemorySink, Reporter, ReportingObserver};
