pub mod inspect;
pub mod list;
pub mod lock;
pub mod provision;
pub mod root;
pub mod update;

use bento_core::{DeclarationFileSource, EnvironmentRegistry};
use bento_runtime::{CancellationToken, PixiManager};
use bento_store::BundlingRootResolver;
use std::path::Path;
use std::sync::Arc;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DECLARATION_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Build the registry all manager-backed commands share: real pixi, the
/// process-wide bundling root, declarations re-read per generation.
pub fn build_registry(
    declarations: &Path,
    cancel: &CancellationToken,
) -> Result<EnvironmentRegistry, String> {
    let manager = PixiManager::locate().map_err(|e| e.to_string())?;
    Ok(EnvironmentRegistry::new(
        BundlingRootResolver::new(),
        Arc::new(manager),
        Arc::new(DeclarationFileSource::new(declarations)),
    )
    .with_cancellation(cancel.clone()))
}

pub fn styled_status(status: &str) -> String {
    use console::Style;
    match status {
        "ready" | "success" => Style::new().green().apply_to(status).to_string(),
        "failed" => Style::new().red().bold().apply_to(status).to_string(),
        "skipped" | "cancelled" => Style::new().yellow().apply_to(status).to_string(),
        "uninstalled" => Style::new().dim().apply_to(status).to_string(),
        other => other.to_owned(),
    }
}
