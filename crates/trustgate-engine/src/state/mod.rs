pub mod atomic;
pub mod flags;
pub mod settings;

pub use flags::{FileFlagStore, MemoryFlagStore};
pub use settings::{
    events_path, flags_path, load_settings, save_settings, update_automation_level,
};
