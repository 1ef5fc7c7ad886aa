pub mod decision;
pub mod evaluator;
pub mod override_gate;

pub use decision::{Disposition, GateVerdict};
pub use evaluator::TrustGate;
pub use override_gate::{OverrideGrant, OverrideLedger, OverrideRequest};
