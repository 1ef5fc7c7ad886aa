use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use trustgate_core::errors::ReportError;
use trustgate_core::events::GateEvent;

use crate::state::atomic::AdvisoryLock;

const GENESIS: &str = "genesis";

/// How long an append waits for another writer to finish.
const APPEND_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

fn line_hash(line: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(line.as_bytes()))
}

fn last_line_hash(content: &str) -> String {
    content
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(line_hash)
        .unwrap_or_else(|| GENESIS.to_string())
}

/// Append an event to a JSONL log, chaining it to the previous line.
///
/// Each line carries `prev_hash`: the SHA-256 of the previous line, or
/// "genesis" for the first. Returns the hash of the written line.
///
/// Read, hash and append happen under the log's advisory lock, so
/// concurrent writers (threads or processes) never share a `prev_hash`.
pub fn append_event(path: &Path, event: &GateEvent) -> Result<String> {
    let _lock = AdvisoryLock::acquire_wait(path, APPEND_LOCK_TIMEOUT)
        .with_context(|| format!("cannot lock event log {}", path.display()))?;
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read event log {}", path.display()))?
    } else {
        String::new()
    };

    let mut entry = serde_json::to_value(event)?;
    if let Some(obj) = entry.as_object_mut() {
        obj.insert(
            "prev_hash".into(),
            serde_json::Value::String(last_line_hash(&content)),
        );
    }
    let line = serde_json::to_string(&entry)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open event log {}", path.display()))?;
    if !content.is_empty() && !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.write_all(line.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_data()
        .with_context(|| format!("cannot sync event log {}", path.display()))?;

    Ok(line_hash(&line))
}

/// Verify the hash chain of an event log. Returns the number of entries.
pub fn verify_chain(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read event log {}", path.display()))?;

    let mut count = 0u64;
    let mut prev_hash = GENESIS.to_string();

    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: serde_json::Value = serde_json::from_str(line)
            .with_context(|| format!("invalid JSON at line {}", i + 1))?;
        let entry_prev = entry
            .get("prev_hash")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(GENESIS);

        if entry_prev != prev_hash {
            return Err(ReportError::ChainCorruption(count)).with_context(|| {
                format!("expected prev_hash '{prev_hash}', got '{entry_prev}'")
            });
        }
        prev_hash = line_hash(line);
        count += 1;
    }

    Ok(count)
}

/// Read typed events, oldest first. A missing log reads as empty.
pub fn read_events(path: &Path) -> Result<Vec<GateEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read event log {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid event at line {}", i + 1))
        })
        .collect()
}
