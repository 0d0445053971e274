//! Proto ↔ Kernel conversion bridge.
//!
//! Converts between protobuf wire types (proto_types.rs) and the
//! kernel's `SyncSnapshot`. Identifiers travel as `namespace:path` text;
//! text that does not parse is dropped on the receiving side.

use tracing::warn;

use origin_engine::container::SyncSnapshot;
use origin_engine::identifier::{LayerKey, OriginKey};

use crate::proto_types::*;

/// Convert a kernel snapshot to its wire form, preserving entry order.
pub fn snapshot_to_proto(snapshot: &SyncSnapshot) -> ProtoSyncOrigin {
    ProtoSyncOrigin {
        entity_id: snapshot.entity_id,
        layers: snapshot
            .layers
            .iter()
            .map(|(layer, origin)| ProtoLayerEntry {
                layer: layer.to_string(),
                origin: origin.to_string(),
            })
            .collect(),
        had_all_origins: snapshot.had_all_origins,
    }
}

/// Convert a received packet back into a kernel snapshot.
///
/// Entries with unparsable identifiers are skipped; registry resolution
/// is left to `OriginContainer::accept_synchronization`.
pub fn proto_to_snapshot(proto: &ProtoSyncOrigin) -> SyncSnapshot {
    let layers = proto
        .layers
        .iter()
        .filter_map(|entry| {
            match (LayerKey::parse(&entry.layer), OriginKey::parse(&entry.origin)) {
                (Ok(layer), Ok(origin)) => Some((layer, origin)),
                _ => {
                    warn!(
                        entity_id = proto.entity_id,
                        layer = %entry.layer,
                        origin = %entry.origin,
                        "dropping malformed sync entry"
                    );
                    None
                }
            }
        })
        .collect();
    SyncSnapshot {
        entity_id: proto.entity_id,
        layers,
        had_all_origins: proto.had_all_origins,
    }
}
