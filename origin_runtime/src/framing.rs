//! Wire framing for the origins channel.
//!
//! Frame format: `[4-byte LE length][ProtoPacket bytes]`, concatenated.
//!
//! Rules:
//!   - Zero-length and oversized frames are rejected
//!   - A packet without a payload is rejected
//!   - A truncated trailing frame fails the whole buffer

use prost::Message;
use thiserror::Error;

use origin_engine::container::SyncSnapshot;

use crate::proto_bridge::{proto_to_snapshot, snapshot_to_proto};
use crate::proto_types::{PacketKind, ProtoAcknowledge, ProtoPacket};

/// Largest accepted frame body.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(usize),
    #[error("truncated frame: expected {expected} bytes, {available} available")]
    Truncated { expected: usize, available: usize },
    #[error("undecodable packet: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("packet carries no payload")]
    EmptyPacket,
}

/// A decoded channel packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    SyncOrigin(SyncSnapshot),
    Acknowledge,
}

impl Packet {
    fn to_proto(&self) -> ProtoPacket {
        let kind = match self {
            Packet::SyncOrigin(snapshot) => PacketKind::SyncOrigin(snapshot_to_proto(snapshot)),
            Packet::Acknowledge => PacketKind::Acknowledge(ProtoAcknowledge {}),
        };
        ProtoPacket { kind: Some(kind) }
    }

    fn from_proto(proto: ProtoPacket) -> Result<Self, WireError> {
        match proto.kind {
            Some(PacketKind::SyncOrigin(sync)) => Ok(Packet::SyncOrigin(proto_to_snapshot(&sync))),
            Some(PacketKind::Acknowledge(_)) => Ok(Packet::Acknowledge),
            None => Err(WireError::EmptyPacket),
        }
    }
}

/// Encode one packet as a length-prefixed frame.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, WireError> {
    let body = packet.to_proto().encode_to_vec();
    if body.is_empty() || body.len() > MAX_FRAME_LEN {
        return Err(WireError::InvalidFrameLength(body.len()));
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode every frame in `bytes`, in order.
pub fn decode_frames(bytes: &[u8]) -> Result<Vec<Packet>, WireError> {
    let mut packets = Vec::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(WireError::Truncated {
                expected: 4,
                available: rest.len(),
            });
        }
        let (len_buf, tail) = rest.split_at(4);
        let len = u32::from_le_bytes([len_buf[0], len_buf[1], len_buf[2], len_buf[3]]) as usize;
        if len == 0 || len > MAX_FRAME_LEN {
            return Err(WireError::InvalidFrameLength(len));
        }
        if tail.len() < len {
            return Err(WireError::Truncated {
                expected: len,
                available: tail.len(),
            });
        }
        let (body, next) = tail.split_at(len);
        packets.push(Packet::from_proto(ProtoPacket::decode(body)?)?);
        rest = next;
    }
    Ok(packets)
}

// ── Outbound queue ─────────────────────────────────────────────

/// Who receives a queued packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketTarget {
    /// The entity itself plus every player tracking it.
    TrackingEntityAndSelf(i32),
    /// A single player.
    Player(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub target: PacketTarget,
    pub frame: Vec<u8>,
}

/// Frames waiting for the transport, in send order.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Envelope>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, target: PacketTarget, packet: &Packet) -> Result<(), WireError> {
        let frame = encode_frame(packet)?;
        self.queue.push(Envelope { target, frame });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use origin_engine::identifier::{LayerKey, OriginKey};

    fn sync_packet() -> Packet {
        Packet::SyncOrigin(SyncSnapshot {
            entity_id: 7,
            layers: vec![(
                LayerKey::parse("origins:origin").unwrap(),
                OriginKey::parse("origins:merling").unwrap(),
            )],
            had_all_origins: false,
        })
    }

    #[test]
    fn test_frames_decode_in_order() {
        let mut bytes = encode_frame(&sync_packet()).unwrap();
        bytes.extend(encode_frame(&Packet::Acknowledge).unwrap());
        let packets = decode_frames(&bytes).unwrap();
        assert_eq!(packets, vec![sync_packet(), Packet::Acknowledge]);
    }

    #[test]
    fn test_rejects_zero_and_oversized_lengths() {
        let zero = 0u32.to_le_bytes();
        assert!(matches!(decode_frames(&zero), Err(WireError::InvalidFrameLength(0))));

        let huge = ((MAX_FRAME_LEN + 1) as u32).to_le_bytes();
        assert!(matches!(decode_frames(&huge), Err(WireError::InvalidFrameLength(_))));
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let frame = encode_frame(&sync_packet()).unwrap();
        let cut = &frame[..frame.len() - 1];
        assert!(matches!(decode_frames(cut), Err(WireError::Truncated { .. })));
        assert!(matches!(decode_frames(&frame[..2]), Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_rejects_packet_without_payload() {
        // Field 15, varint 0: a valid protobuf body that sets no payload.
        let body = [0x78u8, 0x00];
        let mut frame = (body.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&body);
        assert!(matches!(decode_frames(&frame), Err(WireError::EmptyPacket)));
    }

    #[test]
    fn test_outbox_drains_in_send_order() {
        let mut outbox = Outbox::new();
        outbox.send(PacketTarget::TrackingEntityAndSelf(7), &sync_packet()).unwrap();
        outbox.send(PacketTarget::Player(3), &Packet::Acknowledge).unwrap();
        assert_eq!(outbox.len(), 2);
        let drained = outbox.drain();
        assert_eq!(drained[0].target, PacketTarget::TrackingEntityAndSelf(7));
        assert_eq!(drained[1].target, PacketTarget::Player(3));
        assert!(outbox.is_empty());
    }
}
