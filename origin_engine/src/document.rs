/// Origin Engine: Persisted Document
///
/// Shape: `{"Origins": {<layer>: <origin>, ...}, "HadAllOrigins": <bool>}`.
/// Values are kept as raw text so that a damaged save still loads
/// entry by entry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::container::{OriginContainer, OriginContext};
use crate::identifier::{power_source, LayerKey, OriginKey};
use crate::registry::Registries;

/// Persisted form of an origin container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginsDocument {
    #[serde(rename = "Origins", default)]
    pub origins: BTreeMap<String, String>,
    #[serde(rename = "HadAllOrigins", default)]
    pub had_all_origins: bool,
}

impl OriginContainer {
    /// Serialize the assignment. Entries whose layer or origin no longer
    /// resolves are left out.
    pub fn to_document(&self, registries: &Registries) -> OriginsDocument {
        let mut origins = BTreeMap::new();
        for (layer, origin) in self.origins() {
            if !registries.contains_layer(&layer) || !registries.contains_origin(&origin) {
                warn!(%layer, %origin, player = %self.owner().name, "removed missing entry");
                continue;
            }
            origins.insert(layer.to_string(), origin.to_string());
        }
        OriginsDocument {
            origins,
            had_all_origins: self.had_all_origins(),
        }
    }

    /// Restore from a document, replaying every valid entry through
    /// `set_origin`. Orphaned origins have their grants revoked.
    pub fn load_document(&self, ctx: &mut OriginContext<'_>, document: &OriginsDocument) {
        self.layers().write().clear();
        let player = self.owner().name.clone();
        let registries = ctx.registries;

        for (layer_text, origin_text) in &document.origins {
            if origin_text.trim().is_empty() {
                continue;
            }
            let origin = match OriginKey::parse(origin_text) {
                Ok(origin) => origin,
                Err(e) => {
                    warn!(origin = %origin_text, layer = %layer_text, %player, error = %e, "invalid origin");
                    continue;
                }
            };
            if !registries.contains_origin(&origin) {
                warn!(%origin, layer = %layer_text, %player, "missing origin");
                if let Some(ledger) = ctx.powers.as_deref_mut() {
                    ledger.remove_all_powers_from_source(&power_source(&origin));
                }
                continue;
            }
            let layer = match LayerKey::parse(layer_text) {
                Ok(layer) => layer,
                Err(e) => {
                    warn!(layer = %layer_text, %player, error = %e, "invalid layer");
                    if let Some(ledger) = ctx.powers.as_deref_mut() {
                        ledger.remove_all_powers_from_source(&power_source(&origin));
                    }
                    continue;
                }
            };
            if !registries.contains_layer(&layer) {
                warn!(%layer, %player, "missing layer");
                if let Some(ledger) = ctx.powers.as_deref_mut() {
                    ledger.remove_all_powers_from_source(&power_source(&origin));
                }
                continue;
            }
            if let Err(e) = self.set_origin(ctx, &layer, &origin) {
                warn!(%layer, %origin, %player, error = %e, "rejected saved origin");
            }
        }

        self.set_had_all_origins(document.had_all_origins);
    }
}
