//! Environment declarations: the parsed, immutable description of every
//! environment the product ships or a collaborator registers.

use crate::manifest::ManifestSource;
use crate::types::{EnvName, SourceVersion};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("I/O error reading declarations: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid declarations TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported declaration_version {0} (expected 1)")]
    UnsupportedVersion(u32),
    #[error("invalid environment name: {0}")]
    InvalidName(String),
}

/// A declared environment. Immutable once parsed; the registry decides how
/// and when it materializes on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentDefinition {
    /// Unique name, doubling as the environment's cache directory leaf.
    pub name: EnvName,
    /// Where the manifest comes from.
    pub source: ManifestSource,
    /// Version of the declaring bundle, compared against install records.
    pub version: SourceVersion,
    /// Whether installation needs network access.
    #[serde(default)]
    pub requires_download: bool,
    /// Administrative opt-out: the environment is declared but must never
    /// be installed or used.
    #[serde(default)]
    pub skip: bool,
    /// Platform selectors this declaration applies to; empty means all.
    #[serde(default)]
    pub platforms: Vec<String>,
}

impl EnvironmentDefinition {
    pub fn matches_platform(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|p| p == platform)
    }
}

/// The conda-style platform selector of the running process.
pub fn current_platform() -> &'static str {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => "linux-64",
        ("linux", "aarch64") => "linux-aarch64",
        ("macos", "x86_64") => "osx-64",
        ("macos", "aarch64") => "osx-arm64",
        ("windows", "x86_64") => "win-64",
        ("windows", "aarch64") => "win-arm64",
        _ => "unknown",
    }
}

/// Validate an environment name for use as a directory leaf.
///
/// Dot-prefixed entries under the bundling root are reserved for internal
/// use, so names must start with a letter or digit.
pub fn validate_env_name(name: &str) -> Result<(), DeclarationError> {
    if name.is_empty() || name.len() > 64 {
        return Err(DeclarationError::InvalidName(
            "environment name must be 1-64 characters".to_owned(),
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(DeclarationError::InvalidName(
            "environment name must match [a-zA-Z0-9._-]".to_owned(),
        ));
    }
    if !name.as_bytes()[0].is_ascii_alphanumeric() {
        return Err(DeclarationError::InvalidName(
            "environment name must start with a letter or digit".to_owned(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeclarationFile {
    declaration_version: u32,
    #[serde(default, rename = "environment")]
    environments: Vec<EnvironmentDefinition>,
}

/// Parse a declarations document (a `[[environment]]` table list).
pub fn parse_declarations_str(
    text: &str,
) -> Result<Vec<EnvironmentDefinition>, DeclarationError> {
    let file: DeclarationFile = toml::from_str(text)?;
    if file.declaration_version != 1 {
        return Err(DeclarationError::UnsupportedVersion(
            file.declaration_version,
        ));
    }
    for definition in &file.environments {
        validate_env_name(&definition.name)?;
    }
    Ok(file.environments)
}

/// Parse a declarations file from disk.
pub fn parse_declarations_file(
    path: &Path,
) -> Result<Vec<EnvironmentDefinition>, DeclarationError> {
    let text = std::fs::read_to_string(path)?;
    parse_declarations_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{PackageChannel, PackageSpec};

    const SAMPLE: &str = r#"
declaration_version = 1

[[environment]]
name = "org_example_sklearn"
version = "5.3.0"
requires_download = true
platforms = ["linux-64", "win-64"]
[environment.source]
packages = [{ name = "scikit-learn", min_version = "1.4" }]

[[environment]]
name = "org_example_plotting"
version = "5.3.0"
[environment.source]
toml = """
[project]
name = "plotting"
"""
"#;

    #[test]
    fn sample_declarations_parse() {
        let definitions = parse_declarations_str(SAMPLE).unwrap();
        assert_eq!(definitions.len(), 2);

        let sklearn = &definitions[0];
        assert_eq!(sklearn.name, EnvName::new("org_example_sklearn"));
        assert!(sklearn.requires_download);
        assert!(!sklearn.skip);
        assert_eq!(sklearn.platforms, vec!["linux-64", "win-64"]);
        assert_eq!(
            sklearn.source,
            ManifestSource::Packages(vec![PackageSpec {
                name: "scikit-learn".to_owned(),
                channel: PackageChannel::Conda,
                min_version: Some("1.4".to_owned()),
                max_version: None,
            }])
        );

        let plotting = &definitions[1];
        assert!(matches!(plotting.source, ManifestSource::Toml(_)));
        assert!(plotting.platforms.is_empty());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let text = "declaration_version = 2\n";
        assert!(matches!(
            parse_declarations_str(text),
            Err(DeclarationError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn invalid_name_is_rejected() {
        let text = r#"
declaration_version = 1
[[environment]]
name = "has space"
version = "1.0.0"
[environment.source]
toml = "[project]"
"#;
        assert!(matches!(
            parse_declarations_str(text),
            Err(DeclarationError::InvalidName(_))
        ));
    }

    #[test]
    fn empty_platform_list_matches_everything() {
        let definitions = parse_declarations_str(SAMPLE).unwrap();
        assert!(definitions[1].matches_platform("linux-64"));
        assert!(definitions[1].matches_platform("osx-arm64"));
        assert!(definitions[0].matches_platform("linux-64"));
        assert!(!definitions[0].matches_platform("osx-arm64"));
    }

    #[test]
    fn current_platform_is_known() {
        // The test suite only runs on platforms the selector table covers.
        assert_ne!(current_platform(), "unknown");
    }

    #[test]
    fn validate_env_name_accepts_directory_safe_names() {
        assert!(validate_env_name("my-env_1.2").is_ok());
        assert!(validate_env_name("a").is_ok());
        assert!(validate_env_name(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn validate_env_name_rejects_bad_names() {
        assert!(validate_env_name("").is_err());
        assert!(validate_env_name(&"x".repeat(65)).is_err());
        assert!(validate_env_name("has space").is_err());
        assert!(validate_env_name("has/slash").is_err());
        assert!(validate_env_name(".hidden").is_err());
        assert!(validate_env_name("-dash-first").is_err());
    }

    #[test]
    fn parse_declarations_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bento.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let definitions = parse_declarations_file(&path).unwrap();
        assert_eq!(definitions.len(), 2);
    }
}
