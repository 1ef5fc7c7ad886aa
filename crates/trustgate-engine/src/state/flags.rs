use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};

use trustgate_core::traits::FlagStore;

use super::atomic::{atomic_write, AdvisoryLock};

/// Process-local flags.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    flags: Mutex<BTreeMap<String, bool>>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, bool>> {
        self.flags.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FlagStore for MemoryFlagStore {
    fn get(&self, key: &str) -> bool {
        self.lock().get(key).copied().unwrap_or(false)
    }

    fn set(&self, key: &str) -> Result<()> {
        self.lock().insert(key.to_string(), true);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn clear_all(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

/// Flags persisted as a JSON object of `key: true` entries.
///
/// Every mutation rereads the file under the advisory lock and rewrites it
/// atomically, so two CLI invocations never lose each other's flags.
#[derive(Debug, Clone)]
pub struct FileFlagStore {
    path: PathBuf,
}

impl FileFlagStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, bool>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read flags {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("invalid flags file {}", self.path.display()))
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, bool>)) -> Result<()> {
        let _lock = AdvisoryLock::acquire(&self.path)
            .with_context(|| format!("cannot lock flags {}", self.path.display()))?;
        let mut flags = self.load()?;
        f(&mut flags);
        let json = serde_json::to_string_pretty(&flags)?;
        atomic_write(&self.path, json.as_bytes())
    }
}

impl FlagStore for FileFlagStore {
    /// An unreadable file reads as "no flags set".
    fn get(&self, key: &str) -> bool {
        self.load()
            .map(|flags| flags.get(key).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    fn set(&self, key: &str) -> Result<()> {
        self.mutate(|flags| {
            flags.insert(key.to_string(), true);
        })
    }

    fn clear(&self, key: &str) -> Result<()> {
        if !self.get(key) {
            return Ok(());
        }
        self.mutate(|flags| {
            flags.remove(key);
        })
    }

    fn clear_all(&self) -> Result<()> {
        self.mutate(BTreeMap::clear)
    }

    fn keys(&self) -> Vec<String> {
        self.load()
            .map(|flags| flags.into_keys().collect())
            .unwrap_or_default()
    }
}
