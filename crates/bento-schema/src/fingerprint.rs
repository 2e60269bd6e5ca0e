use crate::types::Fingerprint;

/// Normalize manifest text before hashing.
///
/// Line endings are unified to `\n`, trailing whitespace is stripped from
/// every line, and trailing blank lines are dropped, so the same logical
/// manifest yields the same fingerprint regardless of the editor or
/// platform it came from. Anything beyond that — key order, spacing inside
/// a line — is intentionally preserved: two manifests that differ there are
/// treated as distinct inputs.
pub fn normalize_manifest_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Compute the deterministic fingerprint of manifest text.
///
/// The fingerprint doubles as a cache-directory leaf name for ad hoc
/// manifests, so identical manifests must always share a cache entry and
/// distinct manifests must never collide.
pub fn fingerprint(manifest_text: &str) -> Fingerprint {
    let normalized = normalize_manifest_text(manifest_text);
    Fingerprint::new(blake3::hash(normalized.as_bytes()).to_hex().to_string())
}
