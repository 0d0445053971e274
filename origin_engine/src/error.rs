//! Kernel error types.
//!
//! None of these are fatal to a tick: callers log and skip the entry.

use thiserror::Error;

use crate::identifier::{LayerKey, OriginKey, PowerKey, PowerSource};

/// Malformed `namespace:path` text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier path is empty")]
    EmptyPath,

    #[error("invalid namespace {0:?}: must match [a-z0-9_.-]+")]
    InvalidNamespace(String),

    #[error("invalid path {0:?}: must match [a-z0-9_.-/]+")]
    InvalidPath(String),
}

/// Rejected origin assignment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OriginError {
    #[error("tried to assign missing layer {layer} to player {player}")]
    MissingLayer { player: String, layer: LayerKey },

    #[error("tried to assign missing origin {origin} to player {player}")]
    MissingOrigin { player: String, origin: OriginKey },
}

/// Data pack loading failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("malformed data pack: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("data pack redefines the reserved origin {0}")]
    ReservedOrigin(OriginKey),
}

/// A container/ledger pair that does not satisfy the reconciliation rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("[INVARIANT:registered_layer] layer {0} is assigned but not registered")]
    UnregisteredLayer(LayerKey),

    #[error("[INVARIANT:registered_origin] origin {origin} on layer {layer} is not registered")]
    UnregisteredOrigin { layer: LayerKey, origin: OriginKey },

    #[error("[INVARIANT:closure] source {power_source} is missing power {power}")]
    MissingGrant { power_source: PowerSource, power: PowerKey },

    #[error("[INVARIANT:closure] source {power_source} holds unexpected power {power}")]
    UnexpectedGrant { power_source: PowerSource, power: PowerKey },
}
