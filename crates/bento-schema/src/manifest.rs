//! Manifest sources and their normalization to package-manager manifest text.
//!
//! Collaborating layers hand the engine one of several input shapes: an
//! in-memory package list, literal manifest TOML, a conda-style environment
//! YAML, a manifest file on disk, or a pre-bundled project fragment.
//! [`ManifestSource`] collapses all of them into canonical pixi manifest
//! text before anything downstream runs, so the resolution pipeline only
//! ever sees one format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// File name of the manifest materialized into a project directory.
pub const MANIFEST_FILE_NAME: &str = "pixi.toml";

/// File name of the lock artifact the package manager produces.
pub const LOCK_FILE_NAME: &str = "pixi.lock";

/// Channels used when rendering a package list to a manifest.
const DEFAULT_CHANNELS: [&str; 1] = ["conda-forge"];

/// Platforms a rendered manifest targets. Lock resolution validates
/// resolvability across all of them, not just the machine it runs on.
const DEFAULT_PLATFORMS: [&str; 4] = ["linux-64", "osx-64", "osx-arm64", "win-64"];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("I/O error reading manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("manifest rendering failed: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid conda environment YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("manifest is empty")]
    Empty,
    #[error("bundled fragment at '{0}' does not contain a manifest")]
    MissingBundledManifest(PathBuf),
    #[error("invalid package entry: {0}")]
    InvalidPackage(String),
}

/// Where a package is resolved from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageChannel {
    #[default]
    Conda,
    Pip,
}

/// One entry of an in-memory package list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    #[serde(default)]
    pub channel: PackageChannel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,
}

impl PackageSpec {
    /// Render the version constraint. The lower bound is inclusive, the
    /// upper bound exclusive, matching how declaration layers pin ranges.
    fn version_requirement(&self) -> String {
        match (&self.min_version, &self.max_version) {
            (None, None) => "*".to_owned(),
            (Some(min), None) => format!(">={min}"),
            (None, Some(max)) => format!("<{max}"),
            (Some(min), Some(max)) => format!(">={min},<{max}"),
        }
    }
}

/// The supported manifest input shapes.
///
/// Every variant normalizes to manifest TOML text via [`resolve`](Self::resolve);
/// nothing downstream of this type knows which shape an environment was
/// declared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestSource {
    /// In-memory package list, rendered to a manifest.
    Packages(Vec<PackageSpec>),
    /// Literal manifest TOML text, validated and passed through.
    Toml(String),
    /// Conda-style environment YAML, converted to manifest TOML.
    Yaml(String),
    /// Path to a manifest file on disk.
    File(PathBuf),
    /// Directory of a pre-bundled project fragment shipped with the product.
    Bundled(PathBuf),
}

impl ManifestSource {
    /// Collapse this source to canonical manifest text.
    pub fn resolve(&self) -> Result<String, ManifestError> {
        let text = match self {
            Self::Packages(packages) => render_packages(packages)?,
            Self::Toml(text) => {
                text.parse::<toml::Table>()?;
                text.clone()
            }
            Self::Yaml(text) => import_conda_yaml(text)?,
            Self::File(path) => std::fs::read_to_string(path)?,
            Self::Bundled(dir) => {
                let manifest = dir.join(MANIFEST_FILE_NAME);
                if !manifest.is_file() {
                    return Err(ManifestError::MissingBundledManifest(dir.clone()));
                }
                std::fs::read_to_string(manifest)?
            }
        };
        if text.trim().is_empty() {
            return Err(ManifestError::Empty);
        }
        Ok(text)
    }
}

fn project_table(name: &str, channels: &[String]) -> toml::Table {
    let mut project = toml::Table::new();
    project.insert("name".to_owned(), toml::Value::String(name.to_owned()));
    project.insert(
        "channels".to_owned(),
        toml::Value::Array(
            channels
                .iter()
                .map(|c| toml::Value::String(c.clone()))
                .collect(),
        ),
    );
    project.insert(
        "platforms".to_owned(),
        toml::Value::Array(
            DEFAULT_PLATFORMS
                .iter()
                .map(|p| toml::Value::String((*p).to_owned()))
                .collect(),
        ),
    );
    project
}

fn render_dependency_tables(
    conda: &BTreeMap<String, String>,
    pypi: &BTreeMap<String, String>,
    project: toml::Table,
) -> Result<String, ManifestError> {
    let mut doc = toml::Table::new();
    doc.insert("project".to_owned(), toml::Value::Table(project));
    for (key, deps) in [("dependencies", conda), ("pypi-dependencies", pypi)] {
        if deps.is_empty() {
            continue;
        }
        let mut table = toml::Table::new();
        for (name, requirement) in deps {
            table.insert(name.clone(), toml::Value::String(requirement.clone()));
        }
        doc.insert(key.to_owned(), toml::Value::Table(table));
    }
    Ok(toml::to_string(&doc)?)
}

/// Render an in-memory package list to manifest text.
///
/// Packages are emitted sorted by name, so two declarations listing the
/// same packages in different order fingerprint identically.
fn render_packages(packages: &[PackageSpec]) -> Result<String, ManifestError> {
    if packages.is_empty() {
        return Err(ManifestError::Empty);
    }

    let mut conda = BTreeMap::new();
    let mut pypi = BTreeMap::new();
    for package in packages {
        if package.name.trim().is_empty() {
            return Err(ManifestError::InvalidPackage(
                "package name must not be empty".to_owned(),
            ));
        }
        let target = match package.channel {
            PackageChannel::Conda => &mut conda,
            PackageChannel::Pip => &mut pypi,
        };
        target.insert(package.name.clone(), package.version_requirement());
    }

    let channels: Vec<String> = DEFAULT_CHANNELS.iter().map(|c| (*c).to_owned()).collect();
    render_dependency_tables(&conda, &pypi, project_table("environment", &channels))
}

#[derive(Debug, Deserialize)]
struct CondaEnvFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default)]
    dependencies: Vec<CondaEnvDep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CondaEnvDep {
    Conda(String),
    Pip { pip: Vec<String> },
}

/// Split a conda/pip match spec like `numpy>=1.26` into name and constraint.
fn split_match_spec(spec: &str) -> (String, String) {
    let spec = spec.trim();
    match spec.find(['=', '<', '>', '!', '~', ' ']) {
        Some(idx) => {
            let (name, requirement) = spec.split_at(idx);
            (name.trim().to_owned(), requirement.trim().to_owned())
        }
        None => (spec.to_owned(), "*".to_owned()),
    }
}

/// Convert a conda `environment.yml` document to manifest text.
fn import_conda_yaml(text: &str) -> Result<String, ManifestError> {
    // Micromamba platform selectors cannot be represented in a manifest;
    // the affected lines are dropped, not mistranslated.
    let mut filtered = String::with_capacity(text.len());
    for line in text.lines() {
        if line.contains("- sel(") {
            tracing::warn!("skipping unsupported selector line: \"{}\"", line.trim());
            continue;
        }
        filtered.push_str(line);
        filtered.push('\n');
    }

    let env_file: CondaEnvFile = serde_yaml::from_str(&filtered)?;

    let mut conda = BTreeMap::new();
    let mut pypi = BTreeMap::new();
    for dep in &env_file.dependencies {
        match dep {
            CondaEnvDep::Conda(spec) => {
                let (name, requirement) = split_match_spec(spec);
                conda.insert(name, requirement);
            }
            CondaEnvDep::Pip { pip } => {
                for spec in pip {
                    let (name, requirement) = split_match_spec(spec);
                    pypi.insert(name, requirement);
                }
            }
        }
    }

    let channels = if env_file.channels.is_empty() {
        DEFAULT_CHANNELS.iter().map(|c| (*c).to_owned()).collect()
    } else {
        env_file.channels.clone()
    };
    let name = env_file.name.as_deref().unwrap_or("environment");
    render_dependency_tables(&conda, &pypi, project_table(name, &channels))
}
