/// Origin Engine: Origin Container
///
/// Per-player layer → origin assignment, power grants, and the flags that
/// drive synchronization. Writes happen on the tick context only; the map
/// sits behind a read-write lock so other contexts may read it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::RwLock;
use tracing::error;

use crate::domain::{Origin, PlayerProfile, Side};
use crate::error::OriginError;
use crate::events::{NoopEvents, OriginEvents};
use crate::identifier::{power_source, LayerKey, OriginKey};
use crate::power::PowerLedger;
use crate::registry::Registries;

/// Minimum ticks between two synchronization broadcasts.
pub const SYNC_INTERVAL_TICKS: i32 = 20;

/// Everything a container operation may touch outside itself.
pub struct OriginContext<'a> {
    pub registries: &'a Registries,
    /// `None` when the entity carries no power ledger; grants are skipped.
    pub powers: Option<&'a mut dyn PowerLedger>,
    pub events: &'a dyn OriginEvents,
    pub side: Side,
}

impl<'a> OriginContext<'a> {
    pub fn server(registries: &'a Registries, events: &'a dyn OriginEvents) -> Self {
        Self {
            registries,
            powers: None,
            events,
            side: Side::Server,
        }
    }

    pub fn client(registries: &'a Registries) -> Self {
        Self {
            registries,
            powers: None,
            events: &NoopEvents,
            side: Side::Client,
        }
    }

    pub fn with_powers(mut self, powers: &'a mut dyn PowerLedger) -> Self {
        self.powers = Some(powers);
        self
    }

    pub fn with_ledger(mut self, powers: Option<&'a mut dyn PowerLedger>) -> Self {
        self.powers = powers;
        self
    }
}

/// Full assignment snapshot pushed from the authority to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub entity_id: i32,
    pub layers: Vec<(LayerKey, OriginKey)>,
    pub had_all_origins: bool,
}

/// A player's origins.
#[derive(Debug)]
pub struct OriginContainer {
    owner: PlayerProfile,
    layers: RwLock<BTreeMap<LayerKey, OriginKey>>,
    synchronization: AtomicBool,
    had_all_origins: AtomicBool,
    cleanup_pending: AtomicBool,
    sync_cooldown: AtomicI32,
    sync_interval: i32,
}

impl OriginContainer {
    /// A fresh container. Reconciliation runs on its first tick.
    pub fn new(owner: PlayerProfile) -> Self {
        Self {
            owner,
            layers: RwLock::new(BTreeMap::new()),
            synchronization: AtomicBool::new(false),
            had_all_origins: AtomicBool::new(false),
            cleanup_pending: AtomicBool::new(true),
            sync_cooldown: AtomicI32::new(0),
            sync_interval: SYNC_INTERVAL_TICKS,
        }
    }

    pub fn with_sync_interval(mut self, ticks: i32) -> Self {
        self.sync_interval = ticks;
        self
    }

    pub fn owner(&self) -> &PlayerProfile {
        &self.owner
    }

    // ── Assignment ─────────────────────────────────────────────────

    /// Assign `origin` on `layer`.
    ///
    /// Returns `Ok(true)` when the assignment changed, `Ok(false)` when the
    /// origin was already assigned. Unresolved keys are rejected without
    /// touching any state.
    pub fn set_origin(
        &self,
        ctx: &mut OriginContext<'_>,
        layer: &LayerKey,
        origin: &OriginKey,
    ) -> Result<bool, OriginError> {
        let registries = ctx.registries;
        if !registries.contains_layer(layer) {
            error!(player = %self.owner.name, %layer, "tried to assign missing layer");
            return Err(OriginError::MissingLayer {
                player: self.owner.name.clone(),
                layer: layer.clone(),
            });
        }
        let Some(definition) = registries.origin(origin) else {
            error!(player = %self.owner.name, %origin, "tried to assign missing origin");
            return Err(OriginError::MissingOrigin {
                player: self.owner.name.clone(),
                origin: origin.clone(),
            });
        };

        let previous = self.layers.write().insert(layer.clone(), origin.clone());
        if previous.as_ref() == Some(origin) {
            return Ok(false);
        }

        if let Some(ledger) = ctx.powers.as_deref_mut() {
            grant_powers(ledger, registries, origin, definition);
            if let Some(previous) = &previous {
                ledger.remove_all_powers_from_source(&power_source(previous));
            }
        }
        if self.has_all_origins(registries) {
            self.had_all_origins.store(true, Ordering::SeqCst);
        }
        self.synchronize();
        if ctx.side == Side::Server {
            ctx.events.origin_chosen(&self.owner, origin);
        }
        Ok(true)
    }

    /// Assigned origin, or the empty sentinel.
    pub fn get_origin(&self, layer: &LayerKey) -> OriginKey {
        self.layers
            .read()
            .get(layer)
            .cloned()
            .unwrap_or_else(OriginKey::empty)
    }

    pub fn has_origin(&self, layer: &LayerKey) -> bool {
        !self.get_origin(layer).is_empty()
    }

    /// Copy of the current assignment.
    pub fn origins(&self) -> BTreeMap<LayerKey, OriginKey> {
        self.layers.read().clone()
    }

    /// Every active layer holds a non-empty origin right now.
    pub fn has_all_origins(&self, registries: &Registries) -> bool {
        registries
            .active_layers()
            .iter()
            .all(|(layer, _)| self.has_origin(layer))
    }

    /// Historical flag: set once every active layer was filled. Never cleared
    /// by assignment or reconciliation.
    pub fn had_all_origins(&self) -> bool {
        self.had_all_origins.load(Ordering::SeqCst)
    }

    pub(crate) fn set_had_all_origins(&self, value: bool) {
        self.had_all_origins.store(value, Ordering::SeqCst);
    }

    pub(crate) fn layers(&self) -> &RwLock<BTreeMap<LayerKey, OriginKey>> {
        &self.layers
    }

    /// Resolve layers that need no player input.
    ///
    /// Walks active layers in rank order. An empty layer gets its default
    /// origin (when `include_defaults`), else its automatic origin; a layer
    /// offering nothing is skipped. The first layer that needs a real choice
    /// stops the walk. Returns whether anything was assigned.
    pub fn check_auto_choosing_layers(
        &self,
        ctx: &mut OriginContext<'_>,
        include_defaults: bool,
    ) -> bool {
        let registries = ctx.registries;
        let mut chose_automatically = false;
        for (key, layer) in registries.active_layers() {
            if self.has_origin(key) {
                continue;
            }
            if include_defaults {
                if let Some(default) = layer.effective_default() {
                    if self.set_origin(ctx, key, default).is_ok() {
                        chose_automatically = true;
                        continue;
                    }
                }
            }
            if let Some(automatic) = registries.automatic_origin(layer, &self.owner) {
                if self.set_origin(ctx, key, automatic).is_ok() {
                    chose_automatically = true;
                    continue;
                }
            }
            if registries.origin_option_count(layer, &self.owner) == 0 {
                continue;
            }
            break;
        }
        chose_automatically
    }

    /// Fire power callbacks for everything `origin` currently grants.
    pub fn on_chosen(&self, ctx: &mut OriginContext<'_>, origin: &OriginKey, is_orb: bool) {
        let Some(ledger) = ctx.powers.as_deref_mut() else {
            return;
        };
        for power in ledger.powers_from_source(&power_source(origin)) {
            if ctx.registries.power(&power).is_some() {
                ctx.events.power_chosen(&self.owner, &power, is_orb);
            }
        }
    }

    /// Fire power callbacks for every power the player holds.
    pub fn on_chosen_all(&self, ctx: &mut OriginContext<'_>, is_orb: bool) {
        let Some(ledger) = ctx.powers.as_deref_mut() else {
            return;
        };
        for power in ledger.powers() {
            if ctx.registries.power(&power).is_some() {
                ctx.events.power_chosen(&self.owner, &power, is_orb);
            }
        }
    }

    /// Registries were reloaded; reconcile on the next tick.
    pub fn on_reload(&self) {
        self.cleanup_pending.store(true, Ordering::SeqCst);
    }

    pub fn cleanup_pending(&self) -> bool {
        self.cleanup_pending.load(Ordering::SeqCst)
    }

    // ── Synchronization ────────────────────────────────────────────

    /// Mark the assignment dirty.
    pub fn synchronize(&self) {
        self.synchronization.store(true, Ordering::SeqCst);
    }

    pub fn should_sync(&self) -> bool {
        self.synchronization.load(Ordering::SeqCst)
    }

    /// A full snapshot went out through another path (e.g. login).
    pub fn validate_synchronization(&self) {
        self.synchronization.store(false, Ordering::SeqCst);
        self.sync_cooldown.store(0, Ordering::SeqCst);
    }

    /// Per-tick work: lazy reconciliation, then at most one snapshot per
    /// sync interval on the authoritative side.
    pub fn tick(&self, ctx: &mut OriginContext<'_>) -> Option<SyncSnapshot> {
        if self.cleanup_pending.swap(false, Ordering::SeqCst) {
            if let Some(ledger) = ctx.powers.as_deref_mut() {
                self.apply_cleanup(ctx.registries, ledger);
            }
        }
        if ctx.side != Side::Server {
            return None;
        }

        let remaining = match self.sync_cooldown.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |ticks| (ticks > 0).then(|| ticks - 1),
        ) {
            Ok(previous) => previous - 1,
            Err(previous) => previous,
        };
        if remaining > 0 {
            return None;
        }
        if self
            .synchronization
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }

        self.sync_cooldown.store(self.sync_interval, Ordering::SeqCst);
        if let Some(ledger) = ctx.powers.as_deref_mut() {
            ledger.synchronize();
        }
        Some(self.synchronization_packet())
    }

    pub fn synchronization_packet(&self) -> SyncSnapshot {
        SyncSnapshot {
            entity_id: self.owner.entity_id,
            layers: self
                .layers
                .read()
                .iter()
                .map(|(layer, origin)| (layer.clone(), origin.clone()))
                .collect(),
            had_all_origins: self.had_all_origins(),
        }
    }

    /// Observer side: replace the assignment with a received snapshot.
    ///
    /// Entries whose layer or origin is unknown locally are dropped. The
    /// historical flag is overwritten as received.
    pub fn accept_synchronization<I>(&self, registries: &Registries, entries: I, had_all_origins: bool)
    where
        I: IntoIterator<Item = (LayerKey, OriginKey)>,
    {
        {
            let mut layers = self.layers.write();
            layers.clear();
            for (layer, origin) in entries {
                if registries.contains_layer(&layer) && registries.contains_origin(&origin) {
                    layers.insert(layer, origin);
                }
            }
        }
        self.set_had_all_origins(had_all_origins);
    }
}

/// Grant every expected power of `origin` that is not held yet.
pub(crate) fn grant_powers(
    ledger: &mut dyn PowerLedger,
    registries: &Registries,
    origin: &OriginKey,
    definition: &Origin,
) -> usize {
    let source = power_source(origin);
    let mut granted = 0;
    for power in registries.expected_powers(definition) {
        if !ledger.has_power(&power, &source) {
            ledger.add_power(power, source.clone());
            granted += 1;
        }
    }
    granted
}
