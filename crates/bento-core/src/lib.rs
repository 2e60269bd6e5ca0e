//! Core orchestration for bento environment provisioning.
//!
//! This crate ties the schema, store, and runtime layers together into the
//! `EnvironmentRegistry` — the central API for resolving declared
//! environments to on-disk installations with reuse, staleness detection,
//! and at-most-one-install-in-flight-per-key concurrency — and the
//! `LockFileResolver` for interactive manifest resolvability checks.

pub mod lockfile;
pub mod registry;

pub use lockfile::LockFileResolver;
pub use registry::{
    DeclarationFileSource, DefinitionSource, EnvironmentRegistry, ResolvedEnvironment,
    StaticDefinitions,
};

use thiserror::Error;

/// Errors surfaced by the core.
///
/// The enum is `Clone` on purpose: a resolution result is computed once per
/// environment and generation, then shared with every concurrent and later
/// caller, so failures must be as shareable as successes. Nested error
/// payloads are flattened to their messages at the conversion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("manifest error: {0}")]
    Manifest(String),
    #[error("declaration error: {0}")]
    Declaration(String),
    #[error("failed to launch package manager: {0}")]
    Launch(String),
    #[error("installing environment '{name}' failed with exit code {exit_code}:\n{stderr}")]
    InstallFailed {
        name: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("lock resolution failed with exit code {exit_code}:\n{stderr}")]
    LockFailed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    #[error("operation cancelled")]
    Cancelled,
    #[error("no environment named '{0}' is declared")]
    NotFound(String),
    #[error("environment '{0}' was skipped and cannot be used")]
    Skipped(String),
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<bento_store::StoreError> for CoreError {
    fn from(e: bento_store::StoreError) -> Self {
        match e {
            bento_store::StoreError::Configuration(msg) => CoreError::Configuration(msg),
            other => CoreError::Io(other.to_string()),
        }
    }
}

impl From<bento_schema::ManifestError> for CoreError {
    fn from(e: bento_schema::ManifestError) -> Self {
        CoreError::Manifest(e.to_string())
    }
}

impl From<bento_schema::DeclarationError> for CoreError {
    fn from(e: bento_schema::DeclarationError) -> Self {
        CoreError::Declaration(e.to_string())
    }
}

impl From<bento_runtime::LaunchError> for CoreError {
    fn from(e: bento_runtime::LaunchError) -> Self {
        match e {
            bento_runtime::LaunchError::Cancelled => CoreError::Cancelled,
            other => CoreError::Launch(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_failed_display_carries_stderr() {
        let e = CoreError::InstallFailed {
            name: "myenv".to_owned(),
            exit_code: 42,
            stderr: "conflict".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.contains("myenv"));
        assert!(msg.contains("42"));
        assert!(msg.contains("conflict"));
    }

    #[test]
    fn cancelled_launch_maps_to_cancelled() {
        let e: CoreError = bento_runtime::LaunchError::Cancelled.into();
        assert_eq!(e, CoreError::Cancelled);
    }

    #[test]
    fn configuration_store_error_keeps_its_category() {
        let e: CoreError =
            bento_store::StoreError::Configuration("no root".to_owned()).into();
        assert!(matches!(e, CoreError::Configuration(_)));
    }

    #[test]
    fn skipped_display_is_explicit() {
        let e = CoreError::Skipped("legacy".to_owned());
        assert!(e.to_string().contains("skipped and cannot be used"));
    }
}
