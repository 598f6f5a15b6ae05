// digest.rs — SHA-256 fingerprint of a registry.
//
// The digest is computed over the canonical JSON form of the typed registry,
// not over the source text, so comments and formatting changes in the YAML
// do not produce a new fingerprint.

use sha2::{Digest, Sha256};

use crate::model::Registry;

/// Lowercase hex SHA-256 of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of the registry's structural content.
pub fn registry_digest(registry: &Registry) -> String {
    // Plain structs, strings and Vecs always serialize.
    let canonical = serde_json::to_vec(registry).unwrap_or_default();
    hash_bytes(&canonical)
}
