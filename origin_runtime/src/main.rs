//! Origins harness: drives a world and a client replica through one
//! session and checks that they agree.
//!
//! Usage: `origins-harness <datapack.json> [config.json]`
//!
//! Logging follows `RUST_LOG` (default `info`).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use origin_engine::domain::{DataPack, PlayerProfile};
use origin_engine::error::RegistryError;
use origin_engine::events::RecordedEvents;
use origin_engine::hashing::{canonical_hash, ledger_hash};
use origin_engine::registry::Registries;

use origin_runtime::client::ClientWorld;
use origin_runtime::config::{ConfigError, OriginsConfig};
use origin_runtime::drift::{compare_replica, verify_world};
use origin_runtime::framing::WireError;
use origin_runtime::world::{World, WorldError};

const SESSION_TICKS: u32 = 60;

#[derive(Debug, Error)]
enum HarnessError {
    #[error("usage: origins-harness <datapack.json> [config.json]")]
    Usage,
    #[error("failed to read data pack: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Wire(#[from] WireError),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<bool, HarnessError> {
    let pack_path = args.first().map(PathBuf::from).ok_or(HarnessError::Usage)?;
    let config = match args.get(1) {
        Some(path) => OriginsConfig::load(&PathBuf::from(path))?,
        None => OriginsConfig::default(),
    };

    let pack = DataPack::from_json(&fs::read_to_string(&pack_path)?)?;
    let registries = Registries::from_pack(pack.clone())?;
    info!(
        layers = registries.active_layers().len(),
        version = registries.version(),
        "data pack loaded"
    );

    let events = Arc::new(RecordedEvents::new());
    let mut world = World::new(config, registries, events.clone());
    let mut client = ClientWorld::new(Registries::from_pack(pack)?, 1);

    world.join_player(PlayerProfile::new(1, "Alex"))?;
    world.join_player(PlayerProfile::new(2, "Steve"))?;
    world.start_tracking(1, 2)?;
    deliver(&mut world, &mut client)?;
    let ack = client.acknowledge_login()?;
    world.receive_from(1, &ack)?;

    // Each player picks the first choosable origin of every layer still empty.
    for entity_id in [1, 2] {
        let picks: Vec<_> = {
            let Some(player) = world.player(entity_id) else {
                continue;
            };
            let Some(origins) = player.origins.as_ref() else {
                continue;
            };
            world
                .registries()
                .active_layers()
                .into_iter()
                .filter(|(key, _)| !origins.has_origin(key))
                .filter_map(|(key, layer)| {
                    world
                        .registries()
                        .choosable_origins(layer, &player.profile)
                        .first()
                        .map(|origin| (key.clone(), (*origin).clone()))
                })
                .collect()
        };
        for (layer, origin) in picks {
            world.choose_origin(entity_id, &layer, &origin, false)?;
        }
    }

    for _ in 0..SESSION_TICKS {
        world.tick();
        deliver(&mut world, &mut client)?;
    }

    let mut ok = true;
    for (entity_id, report) in compare_replica(&world, &client) {
        error!(entity_id, ?report, "replica drifted");
        ok = false;
    }
    for (entity_id, violations) in verify_world(&world) {
        for violation in violations {
            error!(entity_id, %violation, "invariant violated");
        }
        ok = false;
    }
    for player in world.players() {
        if let (Some(origins), Some(powers)) = (player.origins.as_ref(), player.powers.as_ref()) {
            println!(
                "{} assignment={} grants={}",
                player.profile.name,
                canonical_hash(origins),
                ledger_hash(powers)
            );
        }
    }
    info!(
        ticks = world.tick_count(),
        triggers = events.events().len(),
        "session finished"
    );

    world.save_all()?;
    Ok(ok)
}

/// Hand every frame addressed to the client's player over to the replica.
fn deliver(world: &mut World, client: &mut ClientWorld) -> Result<(), HarnessError> {
    for delivery in world.drain_outbox() {
        if delivery.recipient == client.local_player() {
            client.receive(&delivery.frame)?;
        }
    }
    Ok(())
}
