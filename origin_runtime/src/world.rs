//! World: the authoritative host for every online player's origins.
//!
//! Owns the registries, the player entities and the outbound packet queue.
//! All container writes happen inside `World` methods, one caller at a
//! time; `SharedWorld` serializes callers from several threads.
//!
//! Join order:
//!   1. load the saved document, if any
//!   2. resolve automatic layers
//!   3. send the full assignment and clear the pending flag
//!   4. open the login handshake

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use origin_engine::container::{OriginContainer, OriginContext};
use origin_engine::document::OriginsDocument;
use origin_engine::domain::{DataPack, PlayerProfile};
use origin_engine::error::{OriginError, RegistryError};
use origin_engine::events::OriginEvents;
use origin_engine::identifier::{LayerKey, OriginKey};
use origin_engine::power::{PowerContainer, PowerLedger};
use origin_engine::registry::Registries;

use crate::config::OriginsConfig;
use crate::framing::{decode_frames, Envelope, Outbox, Packet, PacketTarget, WireError};
use crate::handshake::LoginHandshake;
use crate::player_store::{self, StoreError};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no player with entity id {0}")]
    UnknownPlayer(i32),
    #[error("player with entity id {0} already joined")]
    DuplicatePlayer(i32),
    #[error(transparent)]
    Origin(#[from] OriginError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A player and the capabilities attached to it. Either may be absent.
#[derive(Debug)]
pub struct PlayerEntity {
    pub profile: PlayerProfile,
    pub origins: Option<OriginContainer>,
    pub powers: Option<PowerContainer>,
}

impl PlayerEntity {
    pub fn new(profile: PlayerProfile, sync_interval: i32) -> Self {
        Self {
            origins: Some(OriginContainer::new(profile.clone()).with_sync_interval(sync_interval)),
            powers: Some(PowerContainer::new()),
            profile,
        }
    }

    /// Origins without a power ledger: assignments work, grants are skipped.
    pub fn without_powers(profile: PlayerProfile, sync_interval: i32) -> Self {
        Self {
            powers: None,
            ..Self::new(profile, sync_interval)
        }
    }

    pub fn entity_id(&self) -> i32 {
        self.profile.entity_id
    }
}

/// One frame resolved to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: i32,
    pub frame: Vec<u8>,
}

fn server_context<'a>(
    registries: &'a Registries,
    events: &'a dyn OriginEvents,
    powers: &'a mut Option<PowerContainer>,
) -> OriginContext<'a> {
    let ledger = powers.as_mut().map(|p| p as &mut dyn PowerLedger);
    OriginContext::server(registries, events).with_ledger(ledger)
}

pub struct World {
    config: OriginsConfig,
    registries: Registries,
    players: BTreeMap<i32, PlayerEntity>,
    /// tracked entity → players tracking it
    tracking: BTreeMap<i32, BTreeSet<i32>>,
    outbox: Outbox,
    events: Arc<dyn OriginEvents + Send + Sync>,
    handshakes: BTreeMap<i32, LoginHandshake>,
    next_login_index: i32,
    tick_count: u64,
}

impl World {
    pub fn new(
        config: OriginsConfig,
        registries: Registries,
        events: Arc<dyn OriginEvents + Send + Sync>,
    ) -> Self {
        Self {
            config,
            registries,
            players: BTreeMap::new(),
            tracking: BTreeMap::new(),
            outbox: Outbox::new(),
            events,
            handshakes: BTreeMap::new(),
            next_login_index: 0,
            tick_count: 0,
        }
    }

    pub fn config(&self) -> &OriginsConfig {
        &self.config
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn player(&self, entity_id: i32) -> Option<&PlayerEntity> {
        self.players.get(&entity_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerEntity> {
        self.players.values()
    }

    pub fn handshake(&self, entity_id: i32) -> Option<&LoginHandshake> {
        self.handshakes.get(&entity_id)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Lifecycle ──────────────────────────────────────────────────

    /// Join with both capabilities and the configured sync interval.
    pub fn join_player(&mut self, profile: PlayerProfile) -> Result<(), WorldError> {
        let entity = PlayerEntity::new(profile, self.config.sync_interval_ticks);
        self.join(entity)
    }

    pub fn join(&mut self, mut entity: PlayerEntity) -> Result<(), WorldError> {
        let entity_id = entity.entity_id();
        if self.players.contains_key(&entity_id) {
            return Err(WorldError::DuplicatePlayer(entity_id));
        }

        if let Some(origins) = entity.origins.as_ref() {
            let saved = self.load_saved(&entity.profile.name);
            let mut ctx = server_context(&self.registries, &*self.events, &mut entity.powers);
            if let Some(document) = saved {
                origins.load_document(&mut ctx, &document);
            }
            origins.check_auto_choosing_layers(&mut ctx, self.config.include_defaults_on_join);

            let snapshot = origins.synchronization_packet();
            self.outbox
                .send(PacketTarget::TrackingEntityAndSelf(entity_id), &Packet::SyncOrigin(snapshot))?;
            origins.validate_synchronization();

            self.next_login_index += 1;
            self.handshakes
                .insert(entity_id, LoginHandshake::new(self.next_login_index));
        }

        info!(player = %entity.profile.name, entity_id, "player joined");
        self.players.insert(entity_id, entity);
        Ok(())
    }

    /// Saved document of `player`. An unreadable file is moved aside and
    /// the player starts over; a name that cannot be stored loads nothing.
    fn load_saved(&self, player: &str) -> Option<OriginsDocument> {
        let dir = &self.config.player_data_dir;
        match player_store::load_player(dir, player) {
            Ok(saved) => saved,
            Err(StoreError::InvalidPlayerName(_)) => {
                warn!(player, "player name cannot be persisted, starting without saved origins");
                None
            }
            Err(e) => {
                warn!(player, error = %e, "discarding unreadable player file");
                if let Err(e) = player_store::quarantine_player(dir, player) {
                    warn!(player, error = %e, "failed to move unreadable player file aside");
                }
                None
            }
        }
    }

    /// Save and remove a player. Returns the written file, if any.
    pub fn leave(&mut self, entity_id: i32) -> Result<Option<PathBuf>, WorldError> {
        let path = self.save_player(entity_id)?;
        self.players.remove(&entity_id);
        self.handshakes.remove(&entity_id);
        self.tracking.remove(&entity_id);
        for trackers in self.tracking.values_mut() {
            trackers.remove(&entity_id);
        }
        info!(entity_id, "player left");
        Ok(path)
    }

    /// Persist one player's assignment. `None` when it has no origins or
    /// its name cannot be stored.
    pub fn save_player(&self, entity_id: i32) -> Result<Option<PathBuf>, WorldError> {
        let player = self
            .players
            .get(&entity_id)
            .ok_or(WorldError::UnknownPlayer(entity_id))?;
        let Some(origins) = player.origins.as_ref() else {
            return Ok(None);
        };
        let document = origins.to_document(&self.registries);
        match player_store::save_player(&self.config.player_data_dir, &player.profile.name, &document) {
            Ok(path) => Ok(Some(path)),
            Err(StoreError::InvalidPlayerName(name)) => {
                warn!(player = %name, entity_id, "player name cannot be persisted, origins not saved");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_all(&self) -> Result<usize, WorldError> {
        let mut saved = 0;
        for entity_id in self.players.keys() {
            if self.save_player(*entity_id)?.is_some() {
                saved += 1;
            }
        }
        Ok(saved)
    }

    // ── Assignment ─────────────────────────────────────────────────

    /// Assign an origin directly. `Ok(false)` when unchanged or when the
    /// player carries no origins.
    pub fn set_origin(
        &mut self,
        entity_id: i32,
        layer: &LayerKey,
        origin: &OriginKey,
    ) -> Result<bool, WorldError> {
        let player = self
            .players
            .get_mut(&entity_id)
            .ok_or(WorldError::UnknownPlayer(entity_id))?;
        let Some(origins) = player.origins.as_ref() else {
            return Ok(false);
        };
        let mut ctx = server_context(&self.registries, &*self.events, &mut player.powers);
        Ok(origins.set_origin(&mut ctx, layer, origin)?)
    }

    /// A player picked an origin: assign it, resolve the layers that
    /// follow, then fire the power callbacks.
    pub fn choose_origin(
        &mut self,
        entity_id: i32,
        layer: &LayerKey,
        origin: &OriginKey,
        is_orb: bool,
    ) -> Result<bool, WorldError> {
        let player = self
            .players
            .get_mut(&entity_id)
            .ok_or(WorldError::UnknownPlayer(entity_id))?;
        let Some(origins) = player.origins.as_ref() else {
            return Ok(false);
        };
        let mut ctx = server_context(&self.registries, &*self.events, &mut player.powers);
        let changed = origins.set_origin(&mut ctx, layer, origin)?;
        if changed {
            origins.check_auto_choosing_layers(&mut ctx, false);
            origins.on_chosen(&mut ctx, origin, is_orb);
        }
        Ok(changed)
    }

    pub fn check_auto_choosing_layers(
        &mut self,
        entity_id: i32,
        include_defaults: bool,
    ) -> Result<bool, WorldError> {
        let player = self
            .players
            .get_mut(&entity_id)
            .ok_or(WorldError::UnknownPlayer(entity_id))?;
        let Some(origins) = player.origins.as_ref() else {
            return Ok(false);
        };
        let mut ctx = server_context(&self.registries, &*self.events, &mut player.powers);
        Ok(origins.check_auto_choosing_layers(&mut ctx, include_defaults))
    }

    // ── Tracking & sync ────────────────────────────────────────────

    /// `tracker` starts seeing `target`; it receives `target`'s full
    /// assignment right away.
    pub fn start_tracking(&mut self, tracker: i32, target: i32) -> Result<(), WorldError> {
        if !self.players.contains_key(&tracker) {
            return Err(WorldError::UnknownPlayer(tracker));
        }
        let player = self
            .players
            .get(&target)
            .ok_or(WorldError::UnknownPlayer(target))?;
        self.tracking.entry(target).or_default().insert(tracker);
        if let Some(origins) = player.origins.as_ref() {
            self.outbox.send(
                PacketTarget::Player(tracker),
                &Packet::SyncOrigin(origins.synchronization_packet()),
            )?;
        }
        Ok(())
    }

    pub fn stop_tracking(&mut self, tracker: i32, target: i32) {
        if let Some(trackers) = self.tracking.get_mut(&target) {
            trackers.remove(&tracker);
        }
    }

    /// Swap in new registry content; every container reconciles on its
    /// next tick.
    pub fn reload(&mut self, pack: DataPack) -> Result<u64, WorldError> {
        let version = self.registries.reload(pack)?;
        for origins in self.players.values().filter_map(|p| p.origins.as_ref()) {
            origins.on_reload();
            origins.synchronize();
        }
        info!(version, players = self.players.len(), "registries reloaded");
        Ok(version)
    }

    /// Advance every player by one tick. Returns the number of sync
    /// packets queued.
    ///
    /// A snapshot that cannot be framed leaves its container dirty so it
    /// goes out again after the cooldown; other players are unaffected.
    pub fn tick(&mut self) -> usize {
        let mut queued = 0;
        for (entity_id, player) in self.players.iter_mut() {
            let Some(origins) = player.origins.as_ref() else {
                continue;
            };
            let mut ctx = server_context(&self.registries, &*self.events, &mut player.powers);
            let Some(snapshot) = origins.tick(&mut ctx) else {
                continue;
            };
            match self.outbox.send(
                PacketTarget::TrackingEntityAndSelf(*entity_id),
                &Packet::SyncOrigin(snapshot),
            ) {
                Ok(()) => queued += 1,
                Err(e) => {
                    warn!(entity_id = *entity_id, error = %e, "failed to queue origin sync");
                    origins.synchronize();
                }
            }
        }
        self.tick_count += 1;
        queued
    }

    /// Resolve queued frames to concrete recipients, in send order.
    pub fn drain_outbox(&mut self) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for Envelope { target, frame } in self.outbox.drain() {
            match target {
                PacketTarget::Player(recipient) => deliveries.push(Delivery { recipient, frame }),
                PacketTarget::TrackingEntityAndSelf(entity_id) => {
                    let mut recipients = BTreeSet::new();
                    recipients.insert(entity_id);
                    if let Some(trackers) = self.tracking.get(&entity_id) {
                        recipients.extend(trackers.iter().copied());
                    }
                    for recipient in recipients {
                        if self.players.contains_key(&recipient) {
                            deliveries.push(Delivery {
                                recipient,
                                frame: frame.clone(),
                            });
                        }
                    }
                }
            }
        }
        deliveries
    }

    /// Handle frames a client sent to the server.
    pub fn receive_from(&mut self, entity_id: i32, bytes: &[u8]) -> Result<usize, WorldError> {
        let packets = decode_frames(bytes)?;
        for packet in &packets {
            match packet {
                Packet::Acknowledge => match self.handshakes.get_mut(&entity_id) {
                    Some(handshake) => handshake.handle(),
                    None => debug!(entity_id, "acknowledgment without pending login"),
                },
                Packet::SyncOrigin(_) => {
                    warn!(entity_id, "ignoring origin sync sent by a client");
                }
            }
        }
        Ok(packets.len())
    }
}

/// Thread-safe world handle using Mutex.
pub struct SharedWorld {
    inner: Mutex<World>,
}

impl SharedWorld {
    pub fn new(world: World) -> Self {
        Self {
            inner: Mutex::new(world),
        }
    }

    /// Run `f` with exclusive access.
    pub fn with<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn tick(&self) -> usize {
        self.inner.lock().tick()
    }

    pub fn choose_origin(
        &self,
        entity_id: i32,
        layer: &LayerKey,
        origin: &OriginKey,
        is_orb: bool,
    ) -> Result<bool, WorldError> {
        self.inner.lock().choose_origin(entity_id, layer, origin, is_orb)
    }

    pub fn drain_outbox(&self) -> Vec<Delivery> {
        self.inner.lock().drain_outbox()
    }

    pub fn into_inner(self) -> World {
        self.inner.into_inner()
    }
}
