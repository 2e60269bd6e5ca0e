//! Newtype wrappers for the string identifiers that flow through the engine.
//!
//! All newtypes serialize/deserialize as plain strings so install records
//! and declaration files stay human-readable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<std::path::Path> for $name {
            fn as_ref(&self) -> &std::path::Path {
                std::path::Path::new(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Unique name of a declared environment, used as its cache directory leaf.
    EnvName
);

string_newtype!(
    /// Full 64-character hex digest of normalized manifest text.
    Fingerprint
);

string_newtype!(
    /// Version of the declaration that produced an environment (bundle version).
    SourceVersion
);

impl Fingerprint {
    /// Truncated 12-character prefix, for display and logs only.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl SourceVersion {
    /// Whether this version carries a development/unstable qualifier.
    ///
    /// Development builds are never trusted from cache: a cached environment
    /// whose declaration is in flux would silently pin stale package sets.
    pub fn is_development(&self) -> bool {
        self.0.split(['.', '-', '+']).any(|segment| {
            let segment = segment.to_ascii_lowercase();
            segment.starts_with("dev") || segment == "snapshot" || segment == "nightly"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_name_display_and_as_ref() {
        let name = EnvName::new("org_example_sklearn");
        assert_eq!(name.to_string(), "org_example_sklearn");
        assert_eq!(name.as_str(), "org_example_sklearn");
        assert_eq!(AsRef::<str>::as_ref(&name), "org_example_sklearn");
    }

    #[test]
    fn env_name_serde_roundtrip() {
        let name = EnvName::new("myenv");
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"myenv\"");
        let back: EnvName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
    }

    #[test]
    fn fingerprint_short_is_prefix() {
        let fp = Fingerprint::new("abcdef0123456789abcdef0123456789");
        assert_eq!(fp.short(), "abcdef012345");
        assert!(fp.as_str().starts_with(fp.short()));
    }

    #[test]
    fn fingerprint_short_of_tiny_value() {
        let fp = Fingerprint::new("abc");
        assert_eq!(fp.short(), "abc");
    }

    #[test]
    fn release_versions_are_not_development() {
        assert!(!SourceVersion::new("5.3.0").is_development());
        assert!(!SourceVersion::new("1.0.0-rc1").is_development());
        assert!(!SourceVersion::new("2.1.4.v202406").is_development());
    }

    #[test]
    fn development_qualifiers_are_detected() {
        assert!(SourceVersion::new("5.3.0.dev202405").is_development());
        assert!(SourceVersion::new("1.2.0-SNAPSHOT").is_development());
        assert!(SourceVersion::new("0.9.0-devel").is_development());
        assert!(SourceVersion::new("3.0.0+nightly").is_development());
    }

    #[test]
    fn source_version_equality() {
        let a = SourceVersion::new("1.0.0");
        let b = SourceVersion::new("1.0.0");
        let c = SourceVersion::new("1.0.1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
