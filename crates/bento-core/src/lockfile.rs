//! Interactive lock resolution: validate that a manifest can be resolved
//! across platforms, producing a lock artifact without installing anything.

use crate::CoreError;
use bento_runtime::{
    CancellationToken, Invocation, ManagerCommand, PackageManager, PRIVATE_CACHE_ENV,
    PRIVATE_HOME_ENV,
};
use bento_schema::{LOCK_FILE_NAME, MANIFEST_FILE_NAME};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Resolves manifest text to lock-file content via the package manager's
/// `lock` subcommand.
///
/// Deliberately uncached: the purpose of the operation is to validate
/// *current* resolvability of a manifest, so every call performs a fresh
/// resolution in an isolated scratch project.
pub struct LockFileResolver {
    manager: Arc<dyn PackageManager>,
}

impl LockFileResolver {
    pub fn new(manager: Arc<dyn PackageManager>) -> Self {
        Self { manager }
    }

    /// Materialize `manifest_text` into a fresh temporary project, run the
    /// lock subcommand, and return the generated lock content.
    ///
    /// The scratch directory is never reused between calls (no stale-lock
    /// leakage between unrelated checks) and is removed afterwards
    /// regardless of outcome; cleanup failure is logged, not propagated.
    pub fn resolve_lock(
        &self,
        manifest_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CoreError> {
        let project = tempfile::tempdir()?;
        let result = self.resolve_in(project.path(), manifest_text, cancel);
        if let Err(e) = project.close() {
            warn!("failed to clean up lock scratch directory: {e}");
        }
        result
    }

    fn resolve_in(
        &self,
        project: &Path,
        manifest_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, CoreError> {
        std::fs::write(project.join(MANIFEST_FILE_NAME), manifest_text)?;
        let cache_dir = project.join(".cache");
        std::fs::create_dir_all(&cache_dir)?;

        let invocation = Invocation::new(project, &ManagerCommand::Lock)
            .env(PRIVATE_CACHE_ENV, cache_dir.to_string_lossy())
            .env(PRIVATE_HOME_ENV, cache_dir.to_string_lossy());
        let output = self.manager.run(&invocation, cancel)?;

        if !output.success() {
            return Err(CoreError::LockFailed {
                exit_code: output.exit_code,
                stdout: output.stdout.trim().to_owned(),
                stderr: output.stderr.trim().to_owned(),
            });
        }

        let lock_path = project.join(LOCK_FILE_NAME);
        std::fs::read_to_string(&lock_path).map_err(|e| {
            CoreError::Io(format!(
                "lock run succeeded but produced no artifact at '{}': {e}",
                lock_path.display()
            ))
        })
    }
}
