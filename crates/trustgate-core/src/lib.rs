#![forbid(unsafe_code)]

pub mod errors;
pub mod events;
pub mod schema;
pub mod settings;
pub mod traits;
pub mod types;
