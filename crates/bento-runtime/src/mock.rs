//! A scriptable package manager for tests.
//!
//! Mirrors the contract of the real invoker without spawning processes:
//! invocations are recorded, configured exit/streams are returned, and lock
//! and install artifacts are materialized in the working directory so
//! callers can exercise their full read-back paths.

use crate::cancel::CancellationToken;
use crate::invoker::{Invocation, InvocationOutput, PackageManager};
use crate::LaunchError;
use bento_schema::LOCK_FILE_NAME;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Marker file the mock drops on a successful `install` run.
pub const MOCK_INSTALL_MARKER: &str = ".mock-installed";

const DEFAULT_LOCK_CONTENT: &str = "version: 6\nenvironments: {}\n";

pub struct MockPackageManager {
    exit_code: i32,
    stdout: String,
    stderr: String,
    lock_content: Option<String>,
    delay: Option<Duration>,
    invocations: Mutex<Vec<Invocation>>,
}

impl MockPackageManager {
    /// A manager whose every invocation exits 0.
    pub fn succeeding() -> Self {
        Self {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            lock_content: Some(DEFAULT_LOCK_CONTENT.to_owned()),
            delay: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// A manager whose every invocation exits with the given code and
    /// stderr.
    pub fn failing(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
            lock_content: None,
            delay: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Simulate a slow subprocess; the delay polls the cancellation token
    /// like the real invoker does.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn with_lock_content(mut self, content: impl Into<String>) -> Self {
        self.lock_content = Some(content.into());
        self
    }

    /// Number of invocations observed so far.
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().map(|i| i.len()).unwrap_or(0)
    }

    /// Snapshot of all observed invocations.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }
}

impl PackageManager for MockPackageManager {
    fn name(&self) -> &str {
        "mock"
    }

    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutput, LaunchError> {
        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        self.invocations
            .lock()
            .map_err(|e| LaunchError::Io(std::io::Error::other(format!("mutex poisoned: {e}"))))?
            .push(invocation.clone());

        if let Some(delay) = self.delay {
            let deadline = Instant::now() + delay;
            while Instant::now() < deadline {
                if cancel.is_cancelled() {
                    return Err(LaunchError::Cancelled);
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }

        if self.exit_code == 0 {
            match invocation.args.first().map(String::as_str) {
                Some("lock") => {
                    if let Some(content) = &self.lock_content {
                        std::fs::write(invocation.working_dir.join(LOCK_FILE_NAME), content)?;
                    }
                }
                Some("install") => {
                    std::fs::write(invocation.working_dir.join(MOCK_INSTALL_MARKER), "ok")?;
                }
                _ => {}
            }
        }

        Ok(InvocationOutput {
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }
}
