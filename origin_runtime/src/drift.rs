//! Drift detection: replica comparison and world verification.
//!
//! A server container and its client replica must agree after every
//! delivered sync; a reconciled container must satisfy the kernel
//! invariants. Both checks report instead of panicking.

use std::collections::{BTreeMap, BTreeSet};

use origin_engine::container::SyncSnapshot;
use origin_engine::error::InvariantViolation;
use origin_engine::identifier::{LayerKey, OriginKey};
use origin_engine::invariants::collect_violations;

use crate::client::ClientWorld;
use crate::world::World;

/// Differences between two assignments of the same entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    /// Present only in `b`.
    pub added: Vec<(LayerKey, OriginKey)>,
    /// Present only in `a`.
    pub removed: Vec<(LayerKey, OriginKey)>,
    /// `(layer, origin in a, origin in b)`
    pub changed: Vec<(LayerKey, OriginKey, OriginKey)>,
    pub had_all_origins_a: bool,
    pub had_all_origins_b: bool,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.had_all_origins_a == self.had_all_origins_b
    }
}

/// Compare two snapshots entry by entry, ignoring entry order.
pub fn compare_snapshots(a: &SyncSnapshot, b: &SyncSnapshot) -> DriftReport {
    let map_a: BTreeMap<&LayerKey, &OriginKey> = a.layers.iter().map(|(l, o)| (l, o)).collect();
    let map_b: BTreeMap<&LayerKey, &OriginKey> = b.layers.iter().map(|(l, o)| (l, o)).collect();
    let keys: BTreeSet<&LayerKey> = map_a.keys().chain(map_b.keys()).copied().collect();

    let mut report = DriftReport {
        had_all_origins_a: a.had_all_origins,
        had_all_origins_b: b.had_all_origins,
        ..DriftReport::default()
    };
    for layer in keys {
        match (map_a.get(layer), map_b.get(layer)) {
            (Some(oa), Some(ob)) if oa != ob => {
                report
                    .changed
                    .push((layer.clone(), (*oa).clone(), (*ob).clone()))
            }
            (Some(oa), None) => report.removed.push((layer.clone(), (*oa).clone())),
            (None, Some(ob)) => report.added.push((layer.clone(), (*ob).clone())),
            _ => {}
        }
    }
    report
}

/// Compare every server container with the client's replica of it.
/// Entities the client has never seen are reported against an empty
/// assignment.
pub fn compare_replica(server: &World, client: &ClientWorld) -> BTreeMap<i32, DriftReport> {
    let mut drift = BTreeMap::new();
    for player in server.players() {
        let Some(origins) = player.origins.as_ref() else {
            continue;
        };
        let expected = origins.synchronization_packet();
        let actual = client
            .origins(player.entity_id())
            .map(|replica| replica.synchronization_packet())
            .unwrap_or(SyncSnapshot {
                entity_id: player.entity_id(),
                layers: Vec::new(),
                had_all_origins: false,
            });
        let report = compare_snapshots(&expected, &actual);
        if !report.is_clean() {
            drift.insert(player.entity_id(), report);
        }
    }
    drift
}

/// Invariant violations of every player holding both capabilities.
pub fn verify_world(world: &World) -> BTreeMap<i32, Vec<InvariantViolation>> {
    let mut violations = BTreeMap::new();
    for player in world.players() {
        let (Some(origins), Some(powers)) = (player.origins.as_ref(), player.powers.as_ref()) else {
            continue;
        };
        let found = collect_violations(origins, world.registries(), powers);
        if !found.is_empty() {
            violations.insert(player.entity_id(), found);
        }
    }
    violations
}
