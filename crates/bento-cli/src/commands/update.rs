use super::{build_registry, styled_status, EXIT_FAILURE, EXIT_SUCCESS};
use bento_core::CoreError;
use bento_runtime::CancellationToken;
use std::path::Path;

/// Run the package manager's update subcommand for one environment.
pub fn run(declarations: &Path, name: &str, cancel: &CancellationToken) -> Result<u8, String> {
    let registry = build_registry(declarations, cancel)?;
    match registry.update_environment(name) {
        Ok(environment) => {
            println!(
                "{:<24} {} {}",
                name,
                styled_status("ready"),
                environment.path.display()
            );
            Ok(EXIT_SUCCESS)
        }
        Err(CoreError::Cancelled) => {
            eprintln!("update cancelled");
            Ok(EXIT_FAILURE)
        }
        Err(e @ (CoreError::InstallFailed { .. } | CoreError::Skipped(_))) => {
            eprintln!("{e}");
            Ok(EXIT_FAILURE)
        }
        Err(e) => Err(e.to_string()),
    }
}
