//! Runtime configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object
//! (or no file at all) yields a working setup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use origin_engine::container::SYNC_INTERVAL_TICKS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("malformed config: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("sync_interval_ticks must be positive, got {0}")]
    InvalidSyncInterval(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OriginsConfig {
    /// Minimum ticks between two sync broadcasts of one player.
    pub sync_interval_ticks: i32,
    /// Directory holding one `<player>.json` file per player.
    pub player_data_dir: PathBuf,
    /// Whether layer defaults are applied when a player joins.
    pub include_defaults_on_join: bool,
}

impl Default for OriginsConfig {
    fn default() -> Self {
        Self {
            sync_interval_ticks: SYNC_INTERVAL_TICKS,
            player_data_dir: PathBuf::from("playerdata"),
            include_defaults_on_join: true,
        }
    }
}

impl OriginsConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval_ticks <= 0 {
            return Err(ConfigError::InvalidSyncInterval(self.sync_interval_ticks));
        }
        Ok(())
    }
}
