/// Origin Engine: Canonical Hashing
///
/// Deterministic canonical serialization + SHA-256 hashing of a
/// container's assignment and of a ledger's grants.
///
/// Rules:
///   - Entries sorted by layer key, grants by (power, source)
///   - Identifiers written as `namespace:path`
///   - UTF-8 JSON, no whitespace

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::container::OriginContainer;
use crate::power::PowerContainer;
use crate::ENGINE_VERSION;

/// Canonical JSON bytes of a container's assignment.
pub fn canonical_serialize(container: &OriginContainer) -> Vec<u8> {
    let origins: Vec<Value> = container
        .origins()
        .iter()
        .map(|(layer, origin)| json!([layer.to_string(), origin.to_string()]))
        .collect();
    let value = json!({
        "engine_version": ENGINE_VERSION,
        "origins": origins,
        "had_all_origins": container.had_all_origins(),
    });
    value.to_string().into_bytes()
}

/// SHA-256 of the canonical assignment. Lowercase hex.
pub fn canonical_hash(container: &OriginContainer) -> String {
    hex_digest(&canonical_serialize(container))
}

/// SHA-256 of every `(power, source)` grant. Lowercase hex.
pub fn ledger_hash(ledger: &PowerContainer) -> String {
    let grants: Vec<Value> = ledger
        .grants()
        .map(|(power, source)| json!([power.to_string(), source.to_string()]))
        .collect();
    hex_digest(Value::Array(grants).to_string().as_bytes())
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
