use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use trustgate_core::events::{GateEvent, GateEventType};
use trustgate_core::schema;
use trustgate_core::settings::TenantSettings;
use trustgate_core::types::AutomationLevel;

use super::atomic::{atomic_write, AdvisoryLock};
use crate::report::event_log::append_event;

fn sibling(settings_path: &Path, suffix: &str) -> PathBuf {
    let raw = settings_path.to_string_lossy();
    let stem = raw.strip_suffix(".json").unwrap_or(&raw);
    PathBuf::from(format!("{stem}{suffix}"))
}

/// `acme.json` -> `acme.events.jsonl`
pub fn events_path(settings_path: &Path) -> PathBuf {
    sibling(settings_path, ".events.jsonl")
}

/// `acme.json` -> `acme.flags.json`
pub fn flags_path(settings_path: &Path) -> PathBuf {
    sibling(settings_path, ".flags.json")
}

/// Read and schema-check a tenant settings file.
pub fn load_settings(path: &Path) -> Result<TenantSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read settings {}", path.display()))?;
    let data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    schema::validate(&data).with_context(|| format!("invalid settings {}", path.display()))?;
    let settings: TenantSettings = serde_json::from_value(data)
        .with_context(|| format!("cannot decode settings {}", path.display()))?;
    settings
        .retry
        .validate()
        .with_context(|| format!("invalid retry policy in {}", path.display()))?;
    Ok(settings)
}

/// Write settings atomically under the advisory lock.
pub fn save_settings(path: &Path, settings: &TenantSettings) -> Result<()> {
    let _lock = AdvisoryLock::acquire(path)
        .with_context(|| format!("cannot lock settings {}", path.display()))?;
    write_unlocked(path, settings)
}

fn write_unlocked(path: &Path, settings: &TenantSettings) -> Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    atomic_write(path, json.as_bytes())
}

/// Change the tenant's automation level.
///
/// Lock, reload, event, write: the `settings_changed` entry lands in the
/// event log before the new settings are visible. An unchanged level
/// writes nothing.
pub fn update_automation_level(
    path: &Path,
    level: AutomationLevel,
    actor: &str,
) -> Result<TenantSettings> {
    let _lock = AdvisoryLock::acquire(path)
        .with_context(|| format!("cannot lock settings {}", path.display()))?;
    let mut settings = load_settings(path)?;
    let previous = settings.automation_level;
    if previous == level {
        return Ok(settings);
    }

    settings.automation_level = level;
    settings.settings_rev += 1;
    settings.updated_at = Utc::now();

    let event = GateEvent::new(
        GateEventType::SettingsChanged,
        format!("settings:{}", settings.tenant),
        format!("automation level {previous} -> {level} by {actor}"),
    )
    .with_level(level);
    append_event(&events_path(path), &event)?;
    write_unlocked(path, &settings)?;

    info!(
        tenant = %settings.tenant,
        from = previous.as_u8(),
        to = level.as_u8(),
        rev = settings.settings_rev,
        actor,
        "automation level updated"
    );
    Ok(settings)
}
