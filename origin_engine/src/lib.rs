#![forbid(unsafe_code)]

//! Origin Engine: per-player origin assignment and power reconciliation.
//!
//! Pure and synchronous: every operation runs inside a single tick and
//! touches only the container, the injected registries and the injected
//! power ledger.

/// Engine v1. Bumped when canonical hashes change meaning.
pub const ENGINE_VERSION: u32 = 1;

pub mod container;
pub mod document;
pub mod domain;
pub mod error;
pub mod events;
pub mod hashing;
pub mod identifier;
pub mod invariants;
pub mod power;
pub mod reconcile;
pub mod registry;

#[cfg(test)]
mod test_pack;
