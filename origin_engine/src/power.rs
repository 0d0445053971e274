/// Origin Engine: Power Ledger
///
/// Per-entity store of granted powers, each tagged with the source that
/// granted it. A power may be held under several sources at once; it stays
/// active until the last source is removed.

use std::collections::{BTreeMap, BTreeSet};

use crate::identifier::{PowerKey, PowerSource};

/// Operations the origin container needs from a power store.
pub trait PowerLedger {
    fn has_power(&self, power: &PowerKey, source: &PowerSource) -> bool;

    /// Returns `false` when the grant was already held.
    fn add_power(&mut self, power: PowerKey, source: PowerSource) -> bool;

    /// Returns `false` when there was nothing to remove.
    fn remove_power(&mut self, power: &PowerKey, source: &PowerSource) -> bool;

    /// Drop every grant tagged with `source`; returns how many were removed.
    fn remove_all_powers_from_source(&mut self, source: &PowerSource) -> usize;

    fn powers_from_source(&self, source: &PowerSource) -> BTreeSet<PowerKey>;

    /// Every power held under at least one source.
    fn powers(&self) -> BTreeSet<PowerKey>;

    /// Ask the ledger to push its own state to observers.
    fn synchronize(&mut self);
}

/// In-memory power ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerContainer {
    grants: BTreeMap<PowerKey, BTreeSet<PowerSource>>,
    sync_requests: u64,
}

impl PowerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources currently granting `power`.
    pub fn sources(&self, power: &PowerKey) -> BTreeSet<PowerSource> {
        self.grants.get(power).cloned().unwrap_or_default()
    }

    /// All `(power, source)` pairs in key order.
    pub fn grants(&self) -> impl Iterator<Item = (&PowerKey, &PowerSource)> {
        self.grants
            .iter()
            .flat_map(|(power, sources)| sources.iter().map(move |source| (power, source)))
    }

    /// How many times `synchronize` has been requested.
    pub fn sync_requests(&self) -> u64 {
        self.sync_requests
    }
}

impl PowerLedger for PowerContainer {
    fn has_power(&self, power: &PowerKey, source: &PowerSource) -> bool {
        self.grants
            .get(power)
            .is_some_and(|sources| sources.contains(source))
    }

    fn add_power(&mut self, power: PowerKey, source: PowerSource) -> bool {
        self.grants.entry(power).or_default().insert(source)
    }

    fn remove_power(&mut self, power: &PowerKey, source: &PowerSource) -> bool {
        let Some(sources) = self.grants.get_mut(power) else {
            return false;
        };
        let removed = sources.remove(source);
        if sources.is_empty() {
            self.grants.remove(power);
        }
        removed
    }

    fn remove_all_powers_from_source(&mut self, source: &PowerSource) -> usize {
        let mut removed = 0;
        self.grants.retain(|_, sources| {
            if sources.remove(source) {
                removed += 1;
            }
            !sources.is_empty()
        });
        removed
    }

    fn powers_from_source(&self, source: &PowerSource) -> BTreeSet<PowerKey> {
        self.grants
            .iter()
            .filter(|(_, sources)| sources.contains(source))
            .map(|(power, _)| power.clone())
            .collect()
    }

    fn powers(&self) -> BTreeSet<PowerKey> {
        self.grants.keys().cloned().collect()
    }

    fn synchronize(&mut self) {
        self.sync_requests += 1;
    }
}
