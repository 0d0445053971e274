#![forbid(unsafe_code)]

//! Origin Runtime: hosts the origin engine.
//!
//! Wraps the kernel with a ticking world, the sync wire protocol, a client
//! replica, per-player persistence and drift detection.
//!
//! No origin rules live here: assignment, reconciliation and persistence
//! semantics are delegated to the kernel.

pub mod proto_types;
pub mod proto_bridge;
pub mod framing;
pub mod handshake;
pub mod config;
pub mod player_store;
pub mod world;
pub mod client;
pub mod drift;
