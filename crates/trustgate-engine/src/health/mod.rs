pub mod classifier;
pub mod provider;

pub use classifier::{classify_score, HealthClassifier};
pub use provider::{HttpHealthProvider, StaticHealth};
