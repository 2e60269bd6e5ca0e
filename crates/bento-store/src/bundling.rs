//! Resolution of the bundling root: the directory under which all cached
//! environments live.

use crate::StoreError;
use bento_schema::{EnvName, Fingerprint};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable that, when set and non-blank, fully replaces the
/// derived bundling root.
pub const BUNDLING_PATH_ENV: &str = "BENTO_BUNDLING_PATH";

/// Directory segment appended to the installation root when no override
/// is set.
const BUNDLING_SEGMENT: &str = "bundling";

/// Dot-prefixed entries under the root are reserved for internal use and
/// can never collide with environment names (which must not start with a
/// dot).
const CACHE_DIR: &str = ".cache";
const LOCKS_DIR: &str = ".locks";

/// The resolved location of the environment cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlingRoot {
    root: PathBuf,
}

impl BundlingRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Target directory of a named environment.
    #[inline]
    pub fn environment_root(&self, name: &EnvName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Target directory of an ad hoc environment, keyed by its manifest
    /// fingerprint.
    #[inline]
    pub fn fingerprint_root(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(fingerprint.as_str())
    }

    /// Placeholder path handed out for a disabled environment.
    ///
    /// Nothing ever creates this path, so any attempted filesystem use of a
    /// disabled environment fails immediately instead of reading leftovers.
    #[inline]
    pub fn disabled_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.skipped"))
    }

    /// Private package-manager cache for one environment key, keeping
    /// concurrent invocations from corrupting a shared manager cache.
    #[inline]
    pub fn manager_cache_dir(&self, key: &str) -> PathBuf {
        self.root.join(CACHE_DIR).join(key)
    }

    /// Advisory lock file guarding installs for one environment key.
    #[inline]
    pub fn lock_path(&self, key: &str) -> PathBuf {
        self.root.join(LOCKS_DIR).join(format!("{key}.lock"))
    }
}

/// Lazily resolves the bundling root once per resolver instance.
///
/// Both the resolved path and a resolution failure are cached: after the
/// first failed attempt every subsequent call replays the same error
/// without touching the process environment or the filesystem again, so a
/// persistent misconfiguration surfaces as one consistent error instead of
/// repeated noisy probing under concurrent callers.
pub struct BundlingRootResolver {
    override_var: String,
    resolved: OnceLock<Result<BundlingRoot, String>>,
}

impl Default for BundlingRootResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl BundlingRootResolver {
    pub fn new() -> Self {
        Self::with_override_var(BUNDLING_PATH_ENV)
    }

    /// Use a different override variable. Intended for tests, where the
    /// process environment is shared across threads.
    pub fn with_override_var(var: impl Into<String>) -> Self {
        Self {
            override_var: var.into(),
            resolved: OnceLock::new(),
        }
    }

    /// A resolver pinned to a fixed root; the lazy lookup never runs.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let resolved = OnceLock::new();
        let _ = resolved.set(Ok(BundlingRoot::new(root)));
        Self {
            override_var: BUNDLING_PATH_ENV.to_owned(),
            resolved,
        }
    }

    /// Resolve the bundling root, creating the directory on first call.
    pub fn root(&self) -> Result<BundlingRoot, StoreError> {
        self.resolved
            .get_or_init(|| resolve_root(&self.override_var))
            .clone()
            .map_err(StoreError::Configuration)
    }
}

fn resolve_root(override_var: &str) -> Result<BundlingRoot, String> {
    let root = match std::env::var(override_var) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => derived_root()?,
    };
    let root = if root.is_absolute() {
        root
    } else {
        std::env::current_dir()
            .map_err(|e| format!("cannot determine working directory: {e}"))?
            .join(root)
    };
    std::fs::create_dir_all(&root)
        .map_err(|e| format!("cannot create bundling root '{}': {e}", root.display()))?;
    Ok(BundlingRoot::new(root))
}

fn derived_root() -> Result<PathBuf, String> {
    let exe = std::env::current_exe()
        .map_err(|e| format!("cannot locate the running executable: {e}"))?;
    installation_root(&exe)
        .map(|install| install.join(BUNDLING_SEGMENT))
        .ok_or_else(|| {
            format!(
                "cannot derive an installation root from '{}'",
                exe.display()
            )
        })
}

/// The installation root is two levels above the running executable
/// (`<install>/bin/bento` -> `<install>`).
fn installation_root(exe: &Path) -> Option<PathBuf> {
    exe.parent()?.parent().map(Path::to_path_buf)
}
