//! Hand-written protobuf types for the origins channel.
//!
//! Uses prost derive macros for encode/decode without prost-build.
//! Field numbers are part of the wire contract and never change.

use prost::Message;

// ── Packet Envelope ────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoPacket {
    #[prost(oneof = "PacketKind", tags = "1, 2")]
    pub kind: Option<PacketKind>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub enum PacketKind {
    /// Server → client: full origin assignment of one entity.
    #[prost(message, tag = "1")]
    SyncOrigin(ProtoSyncOrigin),
    /// Client → server: confirms a login handshake packet.
    #[prost(message, tag = "2")]
    Acknowledge(ProtoAcknowledge),
}

// ── Synchronization ────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct ProtoSyncOrigin {
    #[prost(int32, tag = "1")]
    pub entity_id: i32,
    #[prost(message, repeated, tag = "2")]
    pub layers: Vec<ProtoLayerEntry>,
    #[prost(bool, tag = "3")]
    pub had_all_origins: bool,
}

/// One `layer → origin` pair, both as `namespace:path` text.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoLayerEntry {
    #[prost(string, tag = "1")]
    pub layer: String,
    #[prost(string, tag = "2")]
    pub origin: String,
}

// ── Handshake ──────────────────────────────────────────────────

/// Empty payload; the login index travels out of band.
#[derive(Clone, PartialEq, Message)]
pub struct ProtoAcknowledge {}
