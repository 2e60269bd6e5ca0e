use super::{EXIT_FAILURE, EXIT_SUCCESS};
use bento_core::{CoreError, LockFileResolver};
use bento_runtime::{CancellationToken, PixiManager};
use std::path::Path;
use std::sync::Arc;

/// Validate that a manifest resolves across platforms and emit the lock
/// content.
pub fn run(
    manifest: &Path,
    output: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<u8, String> {
    let manifest_text = std::fs::read_to_string(manifest)
        .map_err(|e| format!("cannot read manifest '{}': {e}", manifest.display()))?;

    let manager = PixiManager::locate().map_err(|e| e.to_string())?;
    let resolver = LockFileResolver::new(Arc::new(manager));

    match resolver.resolve_lock(&manifest_text, cancel) {
        Ok(content) => {
            match output {
                Some(path) => {
                    std::fs::write(path, &content)
                        .map_err(|e| format!("cannot write '{}': {e}", path.display()))?;
                    eprintln!("lock written to {}", path.display());
                }
                None => print!("{content}"),
            }
            Ok(EXIT_SUCCESS)
        }
        Err(CoreError::Cancelled) => {
            eprintln!("lock resolution cancelled");
            Ok(EXIT_FAILURE)
        }
        Err(e @ CoreError::LockFailed { .. }) => {
            eprintln!("{e}");
            Ok(EXIT_FAILURE)
        }
        Err(e) => Err(e.to_string()),
    }
}
