//! Per-environment install records: the persisted provenance that drives
//! reuse-versus-recreate decisions.

use crate::{fsync_dir, StoreError};
use bento_schema::SourceVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the record written beside each installed environment.
pub const INSTALL_RECORD_FILE: &str = ".bento-install.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstallOutcome::Success => write!(f, "success"),
            InstallOutcome::Failed => write!(f, "failed"),
            InstallOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// The record persisted after every install attempt, success or not.
///
/// Records are never mutated in place; each attempt rewrites the file
/// wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Version of the declaration the environment was created from.
    pub source_version: SourceVersion,
    /// Absolute path of the environment root at creation time. A mismatch
    /// with the current root means the cache was physically relocated and
    /// the record must not be trusted.
    pub creation_path: PathBuf,
    pub outcome: InstallOutcome,
    /// RFC 3339 timestamp of the attempt.
    pub created_at: String,
}

impl InstallRecord {
    pub fn new(
        source_version: SourceVersion,
        creation_path: impl Into<PathBuf>,
        outcome: InstallOutcome,
    ) -> Self {
        Self {
            source_version,
            creation_path: creation_path.into(),
            outcome,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Staleness policy: a record is reusable iff the recorded install
    /// succeeded, the version matches the current declaration, the current
    /// version is not a development build, and the environment has not been
    /// moved since it was created.
    pub fn is_reusable(
        &self,
        current_version: &SourceVersion,
        environment_root: &Path,
    ) -> bool {
        self.outcome == InstallOutcome::Success
            && self.source_version == *current_version
            && !current_version.is_development()
            && self.creation_path == environment_root
    }
}

fn record_path(environment_root: &Path) -> PathBuf {
    environment_root.join(INSTALL_RECORD_FILE)
}

/// Read the install record for an environment root.
///
/// A missing root, a missing file, and a corrupt record are all cache
/// misses; corruption is logged at warning level and never aborts
/// resolution.
pub fn read_record(environment_root: &Path) -> Option<InstallRecord> {
    let path = record_path(environment_root);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("cannot read install record '{}': {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("discarding corrupt install record '{}': {e}", path.display());
            None
        }
    }
}

/// Rewrite the install record wholesale, creating parent directories as
/// needed. The write is atomic: a rename over the previous record, fsynced
/// so a crash cannot leave a half-written file behind.
pub fn write_record(environment_root: &Path, record: &InstallRecord) -> Result<(), StoreError> {
    fs::create_dir_all(environment_root)?;
    let content = serde_json::to_string_pretty(record)?;

    let mut tmp = NamedTempFile::new_in(environment_root)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(record_path(environment_root))
        .map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(environment_root)?;

    Ok(())
}
