//! External package-manager invocation for bento.
//!
//! This crate implements the execution layer: locating the pixi executable
//! for the current platform, running it as a child process with captured
//! output and cooperative cancellation, and a scriptable mock manager so
//! the rest of the engine can be tested without a real package manager.

pub mod cancel;
pub mod invoker;
pub mod mock;

pub use cancel::CancellationToken;
pub use invoker::{
    locate_executable, Invocation, InvocationOutput, ManagerCommand, PackageManager, PixiManager,
    MANAGER_EXECUTABLE_ENV, PRIVATE_CACHE_ENV, PRIVATE_HOME_ENV,
};
pub use mock::MockPackageManager;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("package manager executable '{name}' not found for {os}/{arch}")]
    ExecutableNotFound {
        name: String,
        os: &'static str,
        arch: &'static str,
    },
    #[error("failed to launch package manager: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation cancelled")]
    Cancelled,
}
