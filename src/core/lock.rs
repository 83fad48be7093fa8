//! Per-service run lock.
//!
//! An advisory exclusive `flock` on `locks/<service>.lock`, held for the
//! whole release. The kernel drops it when the process exits, so a crashed
//! run never leaves a stale lock behind.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct RunLock {
    path: PathBuf,
    #[cfg(unix)]
    _handle: nix::fcntl::Flock<File>,
    #[cfg(not(unix))]
    _handle: File,
}

impl RunLock {
    /// Take the lock for `service` at `path` without waiting.
    pub fn acquire(path: &Path, service: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("create {}", parent.display())))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                Error::internal_io(e.to_string(), Some(format!("open lock {}", path.display())))
            })?;

        let handle = lock_file(file, path, service)?;
        let lock = Self {
            path: path.to_path_buf(),
            _handle: handle,
        };
        lock.record_owner();
        log::debug!("acquired run lock {}", path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the holder's pid for operators inspecting a stuck lock. Best effort.
    fn record_owner(&self) {
        let owner = serde_json::json!({
            "pid": std::process::id(),
            "acquired_at": chrono::Local::now().to_rfc3339(),
        });
        if let Ok(mut file) = OpenOptions::new().write(true).truncate(true).open(&self.path) {
            let _ = writeln!(file, "{}", owner);
        }
    }
}

#[cfg(unix)]
fn lock_file(file: File, path: &Path, service: &str) -> Result<nix::fcntl::Flock<File>> {
    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};

    match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
        Ok(handle) => Ok(handle),
        Err((_, Errno::EWOULDBLOCK)) => Err(Error::release_locked(
            service,
            path.display().to_string(),
        )),
        Err((_, errno)) => Err(Error::internal_io(
            format!("flock error: {}", errno),
            Some(path.display().to_string()),
        )),
    }
}

#[cfg(not(unix))]
fn lock_file(file: File, _path: &Path, _service: &str) -> Result<File> {
    log::warn!("run lock is advisory only on this platform");
    Ok(file)
}
