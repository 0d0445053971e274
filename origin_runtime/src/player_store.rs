//! Player store: one JSON file per player.
//!
//! Each file wraps the persisted origins document with the SHA-256 of its
//! serialized form. A file whose hash does not match is refused rather
//! than half-loaded.
//!
//! Layout: `<dir>/<player>.json`

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use origin_engine::document::OriginsDocument;
use origin_engine::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("player file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed player file: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid player name: {0:?}")]
    InvalidPlayerName(String),
    #[error("hash mismatch for {player}: stored {expected}, computed {actual}")]
    HashMismatch {
        player: String,
        expected: String,
        actual: String,
    },
}

/// On-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlayerFile {
    pub player: String,
    /// Engine version at save time.
    pub engine_version: u32,
    pub document: OriginsDocument,
    /// SHA-256 of the document's JSON form, lowercase hex.
    pub hash: String,
}

/// SHA-256 of the document's JSON form. Lowercase hex.
pub fn document_hash(document: &OriginsDocument) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(document)?;
    Ok(Sha256::digest(&bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

pub fn player_path(dir: &Path, player: &str) -> Result<PathBuf, StoreError> {
    let valid = !player.is_empty()
        && player.len() <= 16
        && player.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(StoreError::InvalidPlayerName(player.to_string()));
    }
    Ok(dir.join(format!("{}.json", player)))
}

/// Write a player's document, replacing any previous file.
pub fn save_player(
    dir: &Path,
    player: &str,
    document: &OriginsDocument,
) -> Result<PathBuf, StoreError> {
    let path = player_path(dir, player)?;
    fs::create_dir_all(dir)?;

    let file = PlayerFile {
        player: player.to_string(),
        engine_version: ENGINE_VERSION,
        document: document.clone(),
        hash: document_hash(document)?,
    };
    let content = serde_json::to_string_pretty(&file)?;

    let mut out = File::create(&path)?;
    out.write_all(content.as_bytes())?;
    out.sync_all()?;

    Ok(path)
}

/// Load a player's document. `None` when the player has never been saved.
pub fn load_player(dir: &Path, player: &str) -> Result<Option<OriginsDocument>, StoreError> {
    let path = player_path(dir, player)?;
    if !path.exists() {
        return Ok(None);
    }
    let file: PlayerFile = serde_json::from_str(&fs::read_to_string(&path)?)?;
    verify_player_file(&file)?;
    Ok(Some(file.document))
}

/// Move an unreadable player file aside as `<player>.json.corrupt`,
/// replacing an older one. `None` when there is nothing to move.
pub fn quarantine_player(dir: &Path, player: &str) -> Result<Option<PathBuf>, StoreError> {
    let path = player_path(dir, player)?;
    if !path.exists() {
        return Ok(None);
    }
    let target = path.with_extension("json.corrupt");
    fs::rename(&path, &target)?;
    Ok(Some(target))
}

/// Recompute the document hash and compare it to the stored one.
pub fn verify_player_file(file: &PlayerFile) -> Result<(), StoreError> {
    let actual = document_hash(&file.document)?;
    if actual != file.hash {
        return Err(StoreError::HashMismatch {
            player: file.player.clone(),
            expected: file.hash.clone(),
            actual,
        });
    }
    Ok(())
}
