//! Manifest normalization, fingerprinting, and environment declarations for bento.
//!
//! This crate defines the schema layer: the `ManifestSource` sum type that
//! collapses every supported input shape (package lists, TOML text, conda
//! YAML, files, bundled fragments) into canonical pixi manifest text,
//! deterministic fingerprinting of that text (`fingerprint`), version
//! semantics including development-qualifier detection (`SourceVersion`),
//! and parsing of environment declaration files (`EnvironmentDefinition`).

pub mod definition;
pub mod fingerprint;
pub mod manifest;
pub mod types;

pub use definition::{
    current_platform, parse_declarations_file, parse_declarations_str, validate_env_name,
    DeclarationError, EnvironmentDefinition,
};
pub use fingerprint::{fingerprint, normalize_manifest_text};
pub use manifest::{
    ManifestError, ManifestSource, PackageChannel, PackageSpec, LOCK_FILE_NAME, MANIFEST_FILE_NAME,
};
pub use types::{EnvName, Fingerprint, SourceVersion};
