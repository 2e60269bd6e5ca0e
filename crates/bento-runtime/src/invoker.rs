//! Subprocess invocation of the external package manager.

use crate::cancel::CancellationToken;
use crate::LaunchError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Environment variable carrying the private package cache for one
/// invocation.
pub const PRIVATE_CACHE_ENV: &str = "PIXI_CACHE_DIR";

/// Environment variable carrying the private manager home for one
/// invocation.
pub const PRIVATE_HOME_ENV: &str = "PIXI_HOME";

/// Environment variable pinning the package-manager executable to an
/// explicit path, bypassing discovery.
pub const MANAGER_EXECUTABLE_ENV: &str = "BENTO_PIXI_EXECUTABLE";

/// Base name of the package-manager executable, platform extension excluded.
const MANAGER_EXECUTABLE: &str = "pixi";

/// Poll interval for child exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Subcommands of the external package manager the engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCommand {
    /// Install/sync the project in the working directory.
    Install { environment: Option<String> },
    /// Resolve the project to a lock file without installing.
    Lock,
    /// Update locked packages to the latest versions the manifest allows.
    Update { environment: Option<String> },
}

impl ManagerCommand {
    /// Render to argv. Color and progress output are always disabled: the
    /// streams are captured for diagnostics, not rendered to a terminal.
    pub fn to_args(&self) -> Vec<String> {
        let (subcommand, environment) = match self {
            Self::Install { environment } => ("install", environment.as_deref()),
            Self::Lock => ("lock", None),
            Self::Update { environment } => ("update", environment.as_deref()),
        };
        let mut args = vec![
            subcommand.to_owned(),
            "--color".to_owned(),
            "never".to_owned(),
            "--no-progress".to_owned(),
        ];
        if let Some(name) = environment {
            args.push("--environment".to_owned());
            args.push(name.to_owned());
        }
        args
    }
}

/// One subprocess invocation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub working_dir: PathBuf,
    /// Entries layered over the process environment, used to scope a
    /// private cache/home per invocation.
    pub extra_env: Vec<(String, String)>,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(working_dir: impl Into<PathBuf>, command: &ManagerCommand) -> Self {
        Self {
            working_dir: working_dir.into(),
            extra_env: Vec::new(),
            args: command.to_args(),
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }
}

/// Captured result of a completed invocation.
///
/// A non-zero exit code is data, not an error: the caller decides what
/// failure means and what to do with the captured streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl InvocationOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

pub trait PackageManager: Send + Sync {
    fn name(&self) -> &str;

    /// Run one invocation to completion, blocking the calling thread.
    ///
    /// Cancellation terminates the child process and fails with
    /// [`LaunchError::Cancelled`]; partial output is discarded.
    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutput, LaunchError>;
}

/// Invoker backed by a real pixi executable.
pub struct PixiManager {
    executable: PathBuf,
}

impl PixiManager {
    /// Locate the executable: an explicit [`MANAGER_EXECUTABLE_ENV`] path
    /// first, the running installation's own directory second (bundled
    /// tool), the `PATH` last.
    pub fn locate() -> Result<Self, LaunchError> {
        if let Some(pinned) = std::env::var_os(MANAGER_EXECUTABLE_ENV) {
            let path = PathBuf::from(pinned);
            if path.is_file() {
                return Ok(Self { executable: path });
            }
            tracing::warn!(
                "{MANAGER_EXECUTABLE_ENV} points at '{}', which does not exist; falling back to discovery",
                path.display()
            );
        }
        locate_executable(MANAGER_EXECUTABLE)
            .map(|executable| Self { executable })
            .ok_or(LaunchError::ExecutableNotFound {
                name: MANAGER_EXECUTABLE.to_owned(),
                os: std::env::consts::OS,
                arch: std::env::consts::ARCH,
            })
    }

    /// Use a known executable path (bundled installations, tests).
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

impl PackageManager for PixiManager {
    fn name(&self) -> &str {
        MANAGER_EXECUTABLE
    }

    fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<InvocationOutput, LaunchError> {
        if cancel.is_cancelled() {
            return Err(LaunchError::Cancelled);
        }

        tracing::debug!(
            "running {} {} in {}",
            self.executable.display(),
            invocation.args.join(" "),
            invocation.working_dir.display()
        );

        let mut command = Command::new(&self.executable);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &invocation.extra_env {
            command.env(key, value);
        }

        let mut child = command.spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.is_cancelled() {
                // Terminate rather than abandon: an orphaned install would
                // keep holding file locks in the cache directory.
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout.join();
                let _ = stderr.join();
                return Err(LaunchError::Cancelled);
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        Ok(InvocationOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

/// Collect a child stream to a string on a separate thread, so neither
/// pipe can fill up and deadlock the exit-polling loop.
fn drain<R: Read + Send + 'static>(stream: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let Some(mut stream) = stream else {
            return String::new();
        };
        let mut bytes = Vec::new();
        let _ = stream.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

/// Find an executable by name: the directory of the running executable
/// first (where bundled tools ship), then the `PATH`.
pub fn locate_executable(name: &str) -> Option<PathBuf> {
    let file_name = executable_file_name(name);
    if let Ok(exe) = std::env::current_exe() {
        if let Some(bin_dir) = exe.parent() {
            let bundled = bin_dir.join(&file_name);
            if bundled.is_file() {
                return Some(bundled);
            }
        }
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

fn executable_file_name(name: &str) -> String {
    if cfg!(target_family = "windows") {
        format!("{name}.exe")
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_args_disable_decoration() {
        let args = ManagerCommand::Install { environment: None }.to_args();
        assert_eq!(args, ["install", "--color", "never", "--no-progress"]);
    }

    #[test]
    fn environment_selector_is_appended() {
        let args = ManagerCommand::Install {
            environment: Some("py311".to_owned()),
        }
        .to_args();
        assert_eq!(
            args,
            ["install", "--color", "never", "--no-progress", "--environment", "py311"]
        );
    }

    #[test]
    fn lock_and_update_subcommands() {
        assert_eq!(ManagerCommand::Lock.to_args()[0], "lock");
        assert_eq!(
            ManagerCommand::Update { environment: None }.to_args()[0],
            "update"
        );
    }

    #[test]
    fn invocation_builder_collects_env() {
        let invocation = Invocation::new("/tmp/project", &ManagerCommand::Lock)
            .env(PRIVATE_CACHE_ENV, "/tmp/cache")
            .env(PRIVATE_HOME_ENV, "/tmp/home");
        assert_eq!(invocation.extra_env.len(), 2);
        assert_eq!(invocation.extra_env[0].0, PRIVATE_CACHE_ENV);
    }

    #[test]
    fn pre_cancelled_token_fails_without_spawning() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let manager = PixiManager::with_executable("/nonexistent/pixi");
        let invocation = Invocation {
            working_dir: PathBuf::from("."),
            extra_env: Vec::new(),
            args: vec!["lock".to_owned()],
        };
        assert!(matches!(
            manager.run(&invocation, &cancel),
            Err(LaunchError::Cancelled)
        ));
    }

    #[test]
    fn missing_executable_is_a_launch_error() {
        let manager = PixiManager::with_executable("/nonexistent/pixi");
        let invocation = Invocation {
            working_dir: PathBuf::from("."),
            extra_env: Vec::new(),
            args: vec!["lock".to_owned()],
        };
        assert!(matches!(
            manager.run(&invocation, &CancellationToken::new()),
            Err(LaunchError::Io(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_streams_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PixiManager::with_executable("sh");
        let invocation = Invocation {
            working_dir: dir.path().to_path_buf(),
            extra_env: Vec::new(),
            args: vec![
                "-c".to_owned(),
                "echo resolved; echo conflict >&2; exit 3".to_owned(),
            ],
        };
        let output = manager.run(&invocation, &CancellationToken::new()).unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "resolved");
        assert_eq!(output.stderr.trim(), "conflict");
    }

    #[cfg(unix)]
    #[test]
    fn run_layers_extra_env_over_process_env() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PixiManager::with_executable("sh");
        let invocation = Invocation {
            working_dir: dir.path().to_path_buf(),
            extra_env: vec![("BENTO_TEST_PRIVATE".to_owned(), "scoped".to_owned())],
            args: vec!["-c".to_owned(), "printf %s \"$BENTO_TEST_PRIVATE\"".to_owned()],
        };
        let output = manager.run(&invocation, &CancellationToken::new()).unwrap();
        assert_eq!(output.stdout, "scoped");
    }

    #[cfg(unix)]
    #[test]
    fn cancellation_terminates_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PixiManager::with_executable("sleep");
        let invocation = Invocation {
            working_dir: dir.path().to_path_buf(),
            extra_env: Vec::new(),
            args: vec!["30".to_owned()],
        };

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let result = manager.run(&invocation, &cancel);
        handle.join().unwrap();

        assert!(matches!(result, Err(LaunchError::Cancelled)));
        assert!(
            started.elapsed() < Duration::from_secs(10),
            "cancellation must not wait for the child's natural exit"
        );
    }

    #[cfg(unix)]
    #[test]
    fn locate_executable_searches_path() {
        assert!(locate_executable("sh").is_some());
        assert!(locate_executable("definitely-not-a-real-tool-x").is_none());
    }

    #[test]
    fn locate_honors_pinned_executable() {
        let dir = tempfile::tempdir().unwrap();
        let pinned = dir.path().join("pixi");
        std::fs::write(&pinned, "#!/bin/sh\n").unwrap();
        std::env::set_var(MANAGER_EXECUTABLE_ENV, &pinned);

        let manager = PixiManager::locate().unwrap();
        assert_eq!(manager.executable(), pinned);
        std::env::remove_var(MANAGER_EXECUTABLE_ENV);
    }
}
