use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;

/// Locks older than this are treated as abandoned.
const STALE_LOCK_SECONDS: i64 = 60;

const LOCK_POLL: Duration = Duration::from_millis(5);

/// Write content atomically: temp file in the same directory, fsync, rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let temp_path = dir.join(format!(".{file_name}.{}.{nanos:x}.tmp", std::process::id()));

    let mut file = std::fs::File::create(&temp_path)
        .with_context(|| format!("cannot create temp file for {}", path.display()))?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("cannot rename temp to {}", path.display()))?;
    Ok(())
}

fn lock_path_for(state_path: &Path) -> PathBuf {
    let mut lock_name = state_path.as_os_str().to_owned();
    lock_name.push(".lock");
    PathBuf::from(lock_name)
}

/// A lock whose owner has not written its timestamp yet falls back to the
/// file's mtime.
fn is_stale(lock_path: &Path) -> bool {
    let written = std::fs::read_to_string(lock_path)
        .ok()
        .and_then(|content| content.lines().nth(1).and_then(|ts| ts.parse::<i64>().ok()));
    match written {
        Some(ts) => Utc::now().timestamp() - ts > STALE_LOCK_SECONDS,
        None => std::fs::metadata(lock_path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age.as_secs() > STALE_LOCK_SECONDS.unsigned_abs()),
    }
}

/// Advisory lock file next to a state file, holding the owner's PID and a
/// timestamp. Released on drop.
#[derive(Debug)]
pub struct AdvisoryLock {
    lock_path: PathBuf,
}

impl AdvisoryLock {
    pub fn acquire(state_path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(state_path);
        match Self::try_acquire(lock_path.clone())? {
            Some(lock) => Ok(lock),
            None => bail!(
                "state file is locked by another process (lock: {})",
                lock_path.display()
            ),
        }
    }

    /// Like [`AdvisoryLock::acquire`], but polls a held lock until `timeout`
    /// runs out instead of failing at once. I/O errors still fail at once.
    pub fn acquire_wait(state_path: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = lock_path_for(state_path);
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(lock) = Self::try_acquire(lock_path.clone())? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                bail!(
                    "gave up waiting {timeout:?} for lock {}",
                    lock_path.display()
                );
            }
            std::thread::sleep(LOCK_POLL);
        }
    }

    /// `Ok(None)` while another owner holds a fresh lock.
    fn try_acquire(lock_path: PathBuf) -> Result<Option<Self>> {
        if lock_path.exists() {
            if !is_stale(&lock_path) {
                return Ok(None);
            }
            let _ = std::fs::remove_file(&lock_path);
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot acquire lock {}", lock_path.display()))
            }
        };
        writeln!(file, "{}\n{}", std::process::id(), Utc::now().timestamp())?;

        Ok(Some(Self { lock_path }))
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}
