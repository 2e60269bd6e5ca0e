//! The environment registry: declared environments resolved to on-disk
//! installations, with caching, staleness detection, and per-key install
//! serialization.

use crate::CoreError;
use bento_runtime::{
    CancellationToken, Invocation, InvocationOutput, ManagerCommand, PackageManager,
    PRIVATE_CACHE_ENV, PRIVATE_HOME_ENV,
};
use bento_schema::{
    current_platform, fingerprint, parse_declarations_file, EnvName, EnvironmentDefinition,
    ManifestSource, SourceVersion, MANIFEST_FILE_NAME,
};
use bento_store::{
    read_record, write_record, BundlingRoot, BundlingRootResolver, InstallLock, InstallOutcome,
    InstallRecord,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, info, warn};

/// The runtime handle handed to consumers.
///
/// A disabled handle marks an environment that is permanently unusable in
/// this process (user-skipped or failed); its path deliberately does not
/// exist, so any attempted use fails loudly instead of silently reading
/// leftovers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEnvironment {
    pub name: EnvName,
    pub path: PathBuf,
    pub requires_download: bool,
    pub is_disabled: bool,
}

/// Supplies the declared environments. Enumerated once per cache
/// generation, so an invalidation picks up changed declarations.
pub trait DefinitionSource: Send + Sync {
    /// Enumerate all declarations, in declaration order.
    fn enumerate(&self) -> Result<Vec<EnvironmentDefinition>, CoreError>;
}

/// A fixed list of definitions.
pub struct StaticDefinitions(Vec<EnvironmentDefinition>);

impl StaticDefinitions {
    pub fn new(definitions: Vec<EnvironmentDefinition>) -> Self {
        Self(definitions)
    }
}

impl DefinitionSource for StaticDefinitions {
    fn enumerate(&self) -> Result<Vec<EnvironmentDefinition>, CoreError> {
        Ok(self.0.clone())
    }
}

/// Declarations loaded from a TOML file, re-read on every enumeration so
/// cache invalidation picks up edits.
pub struct DeclarationFileSource {
    path: PathBuf,
}

impl DeclarationFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DefinitionSource for DeclarationFileSource {
    fn enumerate(&self) -> Result<Vec<EnvironmentDefinition>, CoreError> {
        Ok(parse_declarations_file(&self.path)?)
    }
}

/// Per-key resolution cell. The mutex doubles as the in-flight guard:
/// the first caller resolves while holding it, concurrent callers for the
/// same key block on it and then share the stored result.
#[derive(Default)]
struct EnvCell {
    result: Mutex<Option<Result<ResolvedEnvironment, CoreError>>>,
}

/// One cache generation. Invalidation swaps the whole generation for a
/// fresh one, so in-flight resolutions against the old generation finish
/// against a consistent view and never leak into the new cache.
#[derive(Default)]
struct Generation {
    definitions: OnceLock<Result<Vec<EnvironmentDefinition>, CoreError>>,
    cells: Mutex<HashMap<String, Arc<EnvCell>>>,
    snapshot: OnceLock<Arc<BTreeMap<String, ResolvedEnvironment>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolves declared environments to installed, cached directories.
///
/// All state is owned by the instance — there are no process-wide
/// statics — so hosts construct one registry, share it, and invalidate it
/// explicitly (e.g. when declarations change).
pub struct EnvironmentRegistry {
    bundling: BundlingRootResolver,
    manager: Arc<dyn PackageManager>,
    source: Arc<dyn DefinitionSource>,
    cancel: CancellationToken,
    generation: Mutex<Arc<Generation>>,
}

impl EnvironmentRegistry {
    pub fn new(
        bundling: BundlingRootResolver,
        manager: Arc<dyn PackageManager>,
        source: Arc<dyn DefinitionSource>,
    ) -> Self {
        Self {
            bundling,
            manager,
            source,
            cancel: CancellationToken::new(),
            generation: Mutex::new(Arc::new(Generation::default())),
        }
    }

    /// Observe an external cancellation token (e.g. a SIGINT handler);
    /// in-flight installs are terminated when it fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve one declared environment by name.
    ///
    /// The first call per generation installs or revalidates the cache;
    /// later calls return the shared result without further work. A
    /// skipped environment resolves to a disabled placeholder, a failed
    /// install to [`CoreError::InstallFailed`].
    pub fn environment(&self, name: &str) -> Result<ResolvedEnvironment, CoreError> {
        let generation = self.current_generation();
        let definitions = self.definitions(&generation)?;
        let definition = definitions
            .iter()
            .find(|d| d.name == *name)
            .ok_or_else(|| CoreError::NotFound(name.to_owned()))?;
        self.resolve_cell(&generation, definition.name.to_string(), || {
            self.resolve_definition(definition)
        })
    }

    /// Resolve every declared environment and return an immutable snapshot.
    ///
    /// The first call per generation triggers full enumeration and
    /// resolution; afterwards the cached snapshot is served. Environments
    /// that failed to provision appear as disabled placeholders so bulk
    /// consumers never dereference a bogus path.
    pub fn environments(
        &self,
    ) -> Result<Arc<BTreeMap<String, ResolvedEnvironment>>, CoreError> {
        let generation = self.current_generation();
        if let Some(snapshot) = generation.snapshot.get() {
            return Ok(snapshot.clone());
        }

        let definitions = self.definitions(&generation)?;
        let mut map = BTreeMap::new();
        for definition in &definitions {
            let key = definition.name.to_string();
            let result = self.resolve_cell(&generation, key.clone(), || {
                self.resolve_definition(definition)
            });
            let entry = match result {
                Ok(environment) => environment,
                Err(CoreError::Configuration(msg)) => {
                    // Without a bundling root nothing can resolve; this is
                    // global, not per-environment.
                    return Err(CoreError::Configuration(msg));
                }
                Err(e) => {
                    warn!("environment '{key}' is unavailable: {e}");
                    self.disabled_placeholder(definition)?
                }
            };
            map.insert(key, entry);
        }

        let snapshot = generation.snapshot.get_or_init(|| Arc::new(map)).clone();
        Ok(snapshot)
    }

    /// Resolve an undeclared manifest into a fingerprint-keyed cache entry.
    ///
    /// Ad hoc environments have no declared name; the manifest fingerprint
    /// is the cache key, so identical manifests share one entry and
    /// distinct manifests never collide. Reuse, staleness, and in-flight
    /// dedup behave exactly as for named environments.
    pub fn resolve_adhoc(
        &self,
        source: &ManifestSource,
        version: &SourceVersion,
    ) -> Result<ResolvedEnvironment, CoreError> {
        let generation = self.current_generation();
        let root = self.bundling.root()?;
        let manifest_text = source.resolve()?;
        let key = fingerprint(&manifest_text);
        let environment_root = root.fingerprint_root(&key);
        self.resolve_cell(&generation, key.to_string(), || {
            self.ensure_installed(&root, key.as_str(), &environment_root, source, version, true)
        })
    }

    /// Run the package manager's `update` subcommand for an installed
    /// environment and refresh its record.
    pub fn update_environment(&self, name: &str) -> Result<ResolvedEnvironment, CoreError> {
        let resolved = self.environment(name)?;
        if resolved.is_disabled {
            return Err(CoreError::Skipped(name.to_owned()));
        }

        let generation = self.current_generation();
        let definitions = self.definitions(&generation)?;
        let definition = definitions
            .iter()
            .find(|d| d.name == *name)
            .ok_or_else(|| CoreError::NotFound(name.to_owned()))?;

        let root = self.bundling.root()?;
        let _guard = InstallLock::acquire(&root.lock_path(name))?;
        info!("updating environment '{name}'");
        let output = self.run_manager(&root, name, &resolved.path, &ManagerCommand::Update {
            environment: None,
        })?;

        let outcome = if output.success() {
            InstallOutcome::Success
        } else {
            InstallOutcome::Failed
        };
        let record = InstallRecord::new(definition.version.clone(), &resolved.path, outcome);
        write_record(&resolved.path, &record)?;

        if output.success() {
            Ok(resolved)
        } else {
            Err(CoreError::InstallFailed {
                name: name.to_owned(),
                exit_code: output.exit_code,
                stderr: failure_detail(&output),
            })
        }
    }

    /// Discard all cached resolution state.
    ///
    /// The next lookup re-enumerates the declarations and re-evaluates
    /// staleness from scratch. Intended to be triggered externally, e.g.
    /// when bundles are installed or removed.
    pub fn invalidate(&self) {
        *lock(&self.generation) = Arc::new(Generation::default());
        debug!("registry cache invalidated");
    }

    fn current_generation(&self) -> Arc<Generation> {
        lock(&self.generation).clone()
    }

    /// Declarations selected for the current platform, enumerated once per
    /// generation.
    fn definitions(
        &self,
        generation: &Generation,
    ) -> Result<Vec<EnvironmentDefinition>, CoreError> {
        generation
            .definitions
            .get_or_init(|| {
                self.source
                    .enumerate()
                    .map(|definitions| select_for_platform(definitions, current_platform()))
            })
            .clone()
    }

    /// Memoize one key's resolution. The per-cell mutex guarantees
    /// at-most-one install in flight per key: concurrent callers block on
    /// the cell, not on the registry, so unrelated environments still
    /// resolve in parallel.
    fn resolve_cell(
        &self,
        generation: &Generation,
        key: String,
        resolve: impl FnOnce() -> Result<ResolvedEnvironment, CoreError>,
    ) -> Result<ResolvedEnvironment, CoreError> {
        let cell = lock(&generation.cells).entry(key).or_default().clone();

        let mut slot = lock(&cell.result);
        if let Some(result) = slot.as_ref() {
            return result.clone();
        }
        let result = resolve();
        // A cancelled resolution is not an outcome: the next caller (with a
        // live token) must be able to try again within this generation.
        if !matches!(result, Err(CoreError::Cancelled)) {
            *slot = Some(result.clone());
        }
        result
    }

    fn resolve_definition(
        &self,
        definition: &EnvironmentDefinition,
    ) -> Result<ResolvedEnvironment, CoreError> {
        let root = self.bundling.root()?;

        if definition.skip {
            let environment_root = root.environment_root(&definition.name);
            let record = InstallRecord::new(
                definition.version.clone(),
                &environment_root,
                InstallOutcome::Skipped,
            );
            write_record(&environment_root, &record)?;
            info!(
                "environment '{}' is skipped; handing out a disabled placeholder",
                definition.name
            );
            return self.disabled_placeholder(definition);
        }

        let environment_root = root.environment_root(&definition.name);
        self.ensure_installed(
            &root,
            definition.name.as_str(),
            &environment_root,
            &definition.source,
            &definition.version,
            definition.requires_download,
        )
    }

    /// The reuse-or-install pipeline shared by named and ad hoc
    /// environments.
    fn ensure_installed(
        &self,
        root: &BundlingRoot,
        key: &str,
        environment_root: &Path,
        source: &ManifestSource,
        version: &SourceVersion,
        requires_download: bool,
    ) -> Result<ResolvedEnvironment, CoreError> {
        let resolved = ResolvedEnvironment {
            name: EnvName::new(key),
            path: environment_root.to_path_buf(),
            requires_download,
            is_disabled: false,
        };

        // Hot path: a matching record serves the cached install without
        // touching the package manager or the manifest source.
        if let Some(record) = read_record(environment_root) {
            if record.is_reusable(version, environment_root) {
                debug!("reusing cached environment '{key}'");
                return Ok(resolved);
            }
            info!(
                "cached environment '{key}' is stale (recorded version {}, outcome {}, declared {version})",
                record.source_version, record.outcome
            );
        }

        let manifest_text = source.resolve()?;

        // Advisory cross-process guard. In-process serialization is already
        // guaranteed by the per-key cell.
        let _guard = InstallLock::acquire(&root.lock_path(key))?;

        std::fs::create_dir_all(environment_root)?;
        std::fs::write(environment_root.join(MANIFEST_FILE_NAME), &manifest_text)?;

        info!(
            "installing environment '{key}' into {}",
            environment_root.display()
        );
        let output = self.run_manager(root, key, environment_root, &ManagerCommand::Install {
            environment: None,
        })?;

        if output.success() {
            let record = InstallRecord::new(
                version.clone(),
                environment_root,
                InstallOutcome::Success,
            );
            write_record(environment_root, &record)?;
            Ok(resolved)
        } else {
            let record =
                InstallRecord::new(version.clone(), environment_root, InstallOutcome::Failed);
            write_record(environment_root, &record)?;
            Err(CoreError::InstallFailed {
                name: key.to_owned(),
                exit_code: output.exit_code,
                stderr: failure_detail(&output),
            })
        }
    }

    /// Invoke the package manager in `working_dir` with a cache/home scoped
    /// to this environment key, so concurrent installs cannot corrupt a
    /// shared manager cache.
    fn run_manager(
        &self,
        root: &BundlingRoot,
        key: &str,
        working_dir: &Path,
        command: &ManagerCommand,
    ) -> Result<InvocationOutput, CoreError> {
        let cache_dir = root.manager_cache_dir(key);
        std::fs::create_dir_all(&cache_dir)?;
        let invocation = Invocation::new(working_dir, command)
            .env(PRIVATE_CACHE_ENV, cache_dir.to_string_lossy())
            .env(PRIVATE_HOME_ENV, cache_dir.to_string_lossy());
        Ok(self.manager.run(&invocation, &self.cancel)?)
    }

    fn disabled_placeholder(
        &self,
        definition: &EnvironmentDefinition,
    ) -> Result<ResolvedEnvironment, CoreError> {
        let root = self.bundling.root()?;
        Ok(ResolvedEnvironment {
            name: definition.name.clone(),
            path: root.disabled_path(&definition.name),
            requires_download: definition.requires_download,
            is_disabled: true,
        })
    }
}

/// Select at most one definition per name for the given platform.
///
/// When several platform variants of the same logical environment match,
/// the first in declaration order wins and the rest are logged and
/// ignored; variants are never merged or picked at random.
fn select_for_platform(
    definitions: Vec<EnvironmentDefinition>,
    platform: &str,
) -> Vec<EnvironmentDefinition> {
    let mut selected: Vec<EnvironmentDefinition> = Vec::new();
    for definition in definitions {
        if !definition.matches_platform(platform) {
            debug!(
                "environment '{}' does not apply to {platform}",
                definition.name
            );
            continue;
        }
        if selected.iter().any(|d| d.name == definition.name) {
            warn!(
                "ignoring duplicate declaration of environment '{}' for {platform}; the first declaration wins",
                definition.name
            );
            continue;
        }
        selected.push(definition);
    }
    selected
}

fn failure_detail(output: &InvocationOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.stdout.trim().to_owned()
    } else {
        stderr.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, platforms: &[&str]) -> EnvironmentDefinition {
        EnvironmentDefinition {
            name: EnvName::new(name),
            source: ManifestSource::Toml("[project]\nname = \"t\"\n".to_owned()),
            version: SourceVersion::new("1.0.0"),
            requires_download: false,
            skip: false,
            platforms: platforms.iter().map(|p| (*p).to_owned()).collect(),
        }
    }

    #[test]
    fn select_keeps_declaration_order() {
        let selected = select_for_platform(
            vec![definition("b", &[]), definition("a", &[])],
            "linux-64",
        );
        let names: Vec<_> = selected.iter().map(|d| d.name.to_string()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn select_filters_foreign_platforms() {
        let selected = select_for_platform(
            vec![
                definition("a", &["win-64"]),
                definition("b", &["linux-64", "osx-arm64"]),
            ],
            "linux-64",
        );
        let names: Vec<_> = selected.iter().map(|d| d.name.to_string()).collect();
        assert_eq!(names, ["b"]);
    }

    #[test]
    fn first_matching_variant_wins() {
        let mut first = definition("env", &["linux-64"]);
        first.version = SourceVersion::new("1.0.0");
        let mut second = definition("env", &["linux-64"]);
        second.version = SourceVersion::new("2.0.0");

        let selected = select_for_platform(vec![first, second], "linux-64");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].version, SourceVersion::new("1.0.0"));
    }

    #[test]
    fn failure_detail_prefers_stderr() {
        let output = InvocationOutput {
            exit_code: 1,
            stdout: "progress noise".to_owned(),
            stderr: "conflict\n".to_owned(),
        };
        assert_eq!(failure_detail(&output), "conflict");

        let quiet = InvocationOutput {
            exit_code: 1,
            stdout: "only stdout detail\n".to_owned(),
            stderr: String::new(),
        };
        assert_eq!(failure_detail(&quiet), "only stdout detail");
    }

    #[test]
    fn static_source_preserves_order() {
        let source = StaticDefinitions::new(vec![definition("x", &[]), definition("y", &[])]);
        let enumerated = source.enumerate().unwrap();
        assert_eq!(enumerated[0].name, EnvName::new("x"));
        assert_eq!(enumerated[1].name, EnvName::new("y"));
    }
}
