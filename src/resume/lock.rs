//! Advisory lock on the export directory
//!
//! Implements exclusive locking using fd-lock. The lock is held for as long
//! as the guard returned by [`ExportLock::try_hold`] lives.

use super::ResumeError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file wrapper
pub struct ExportLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl ExportLock {
    /// Open (or create) the lock file without locking it
    pub fn open(path: &Path) -> Result<Self, ResumeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ResumeError::IoError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(file),
        })
    }

    /// Take the exclusive lock without blocking
    ///
    /// Fails with [`ResumeError::Locked`] when another process holds it.
    pub fn try_hold(&mut self) -> Result<RwLockWriteGuard<'_, File>, ResumeError> {
        let guard = self.lock.try_write().map_err(|e| ResumeError::Locked {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %self.path.display(), "Acquired export directory lock");
        Ok(guard)
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
