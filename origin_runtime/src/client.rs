//! Client replica: passive mirror of the server's assignments.
//!
//! Never decides anything: every container here is overwritten wholesale
//! by the sync packets it receives.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use origin_engine::container::{OriginContainer, SyncSnapshot};
use origin_engine::domain::PlayerProfile;
use origin_engine::registry::Registries;

use crate::framing::{decode_frames, encode_frame, Packet, WireError};

pub struct ClientWorld {
    registries: Registries,
    entities: BTreeMap<i32, OriginContainer>,
    local_player: i32,
}

impl ClientWorld {
    pub fn new(registries: Registries, local_player: i32) -> Self {
        Self {
            registries,
            entities: BTreeMap::new(),
            local_player,
        }
    }

    pub fn local_player(&self) -> i32 {
        self.local_player
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// Replace registry content, e.g. after the server pushed a reload.
    pub fn replace_registries(&mut self, registries: Registries) {
        self.registries = registries;
    }

    pub fn origins(&self, entity_id: i32) -> Option<&OriginContainer> {
        self.entities.get(&entity_id)
    }

    /// Apply every frame in `bytes`. Returns the number of sync packets
    /// applied.
    pub fn receive(&mut self, bytes: &[u8]) -> Result<usize, WireError> {
        let mut applied = 0;
        for packet in decode_frames(bytes)? {
            match packet {
                Packet::SyncOrigin(snapshot) => {
                    self.apply(snapshot);
                    applied += 1;
                }
                Packet::Acknowledge => warn!("ignoring acknowledgment sent to a client"),
            }
        }
        Ok(applied)
    }

    /// Frame confirming the login packet.
    pub fn acknowledge_login(&self) -> Result<Vec<u8>, WireError> {
        encode_frame(&Packet::Acknowledge)
    }

    fn apply(&mut self, snapshot: SyncSnapshot) {
        let SyncSnapshot {
            entity_id,
            layers,
            had_all_origins,
        } = snapshot;
        debug!(entity_id, entries = layers.len(), "applying origin sync");
        let container = self
            .entities
            .entry(entity_id)
            .or_insert_with(|| OriginContainer::new(PlayerProfile::new(entity_id, "")));
        container.accept_synchronization(&self.registries, layers, had_all_origins);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use origin_engine::domain::DataPack;
    use origin_engine::identifier::{LayerKey, OriginKey};

    const PACK: &str = include_str!("../../origin_engine/tests/fixtures/datapack.json");

    fn entry(layer: &str, origin: &str) -> (LayerKey, OriginKey) {
        (LayerKey::parse(layer).unwrap(), OriginKey::parse(origin).unwrap())
    }

    #[test]
    fn test_sync_replaces_assignment() {
        let registries = Registries::from_pack(DataPack::from_json(PACK).unwrap()).unwrap();
        let mut client = ClientWorld::new(registries, 1);

        let first = encode_frame(&Packet::SyncOrigin(SyncSnapshot {
            entity_id: 1,
            layers: vec![
                entry("origins:origin", "origins:merling"),
                entry("origins:class", "origins:warrior"),
            ],
            had_all_origins: true,
        }))
        .unwrap();
        assert_eq!(client.receive(&first).unwrap(), 1);

        let second = encode_frame(&Packet::SyncOrigin(SyncSnapshot {
            entity_id: 1,
            layers: vec![
                entry("origins:origin", "origins:human"),
                entry("origins:class", "origins:not_on_client"),
            ],
            had_all_origins: true,
        }))
        .unwrap();
        client.receive(&second).unwrap();

        let origins = client.origins(1).unwrap();
        assert_eq!(
            origins.origins().into_iter().collect::<Vec<_>>(),
            vec![entry("origins:origin", "origins:human")]
        );
        assert!(origins.had_all_origins());
    }

    #[test]
    fn test_garbage_is_rejected_whole() {
        let mut client = ClientWorld::new(Registries::new(), 1);
        assert!(client.receive(&[1, 0, 0]).is_err());
        assert!(client.origins(1).is_none());
    }
}
