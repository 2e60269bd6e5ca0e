//! Advisory file locking around install attempts.
//!
//! The registry serializes same-key installs within the process; this lock
//! adds best-effort protection against a second process installing into the
//! same environment root. It is advisory only: external tools that ignore
//! it are not stopped, and the in-process per-key serialization remains the
//! authoritative guarantee.

use crate::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

pub struct InstallLock {
    lock_file: File,
}

impl InstallLock {
    /// Acquire the lock, blocking until it is available.
    pub fn acquire(lock_path: &Path) -> Result<Self, StoreError> {
        let file = Self::open(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| StoreError::LockFailed(e.to_string()))?;
        Ok(Self { lock_file: file })
    }

    /// Acquire the lock if it is free, returning `None` when another holder
    /// has it.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, StoreError> {
        let file = Self::open(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }

    fn open(lock_path: &Path) -> Result<File, StoreError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(lock_path)?)
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}
