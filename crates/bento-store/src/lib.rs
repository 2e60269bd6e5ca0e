//! Storage layer for bento: bundling-root resolution, per-environment
//! install records, and advisory file locking.
//!
//! This crate owns everything that touches the cache directory structure:
//! `BundlingRootResolver` determines (once per process) where cached
//! environments live, `InstallRecord` persistence tracks install provenance
//! beside each environment, and `InstallLock` provides best-effort
//! cross-process exclusion around install attempts.

pub mod bundling;
pub mod lock;
pub mod metadata;

pub use bundling::{BundlingRoot, BundlingRootResolver, BUNDLING_PATH_ENV};
pub use lock::InstallLock;
pub use metadata::{
    read_record, write_record, InstallOutcome, InstallRecord, INSTALL_RECORD_FILE,
};

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee
/// this on all filesystems and mount configurations.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("bundling root unavailable: {0}")]
    Configuration(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
}
