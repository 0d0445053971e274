/// Origin Engine: Registries
///
/// Versioned lookup service over the loaded data pack.
/// `reload` swaps the whole content and bumps the version; containers
/// observe the reload through `OriginContainer::on_reload`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::domain::{DataPack, Layer, Origin, PlayerProfile, PowerDefinition};
use crate::error::RegistryError;
use crate::identifier::{LayerKey, OriginKey, PowerKey};

/// Layer, origin and power definitions currently in effect.
#[derive(Debug, Clone)]
pub struct Registries {
    version: u64,
    layers: BTreeMap<LayerKey, Layer>,
    origins: BTreeMap<OriginKey, Origin>,
    powers: BTreeMap<PowerKey, PowerDefinition>,
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

impl Registries {
    /// Empty registries holding only the built-in empty origin.
    pub fn new() -> Self {
        let mut origins = BTreeMap::new();
        origins.insert(OriginKey::empty(), Origin::default());
        Self {
            version: 0,
            layers: BTreeMap::new(),
            origins,
            powers: BTreeMap::new(),
        }
    }

    pub fn from_pack(pack: DataPack) -> Result<Self, RegistryError> {
        let mut registries = Self::new();
        registries.reload(pack)?;
        Ok(registries)
    }

    /// Replace all content with `pack`. On error the previous content stays.
    ///
    /// Layer references to unknown origins are dropped with a warning.
    pub fn reload(&mut self, pack: DataPack) -> Result<u64, RegistryError> {
        let DataPack {
            mut layers,
            mut origins,
            powers,
        } = pack;

        if origins.contains_key(&OriginKey::empty()) {
            return Err(RegistryError::ReservedOrigin(OriginKey::empty()));
        }
        origins.insert(OriginKey::empty(), Origin::default());

        for (key, layer) in layers.iter_mut() {
            layer.origins.retain(|origin| {
                let known = origins.contains_key(origin);
                if !known {
                    warn!(layer = %key, %origin, "layer references unknown origin, dropping it");
                }
                known
            });
            if let Some(default) = &layer.default_origin {
                if !origins.contains_key(default) {
                    warn!(layer = %key, origin = %default, "layer default origin is unknown, clearing it");
                    layer.default_origin = None;
                }
            }
        }

        self.layers = layers;
        self.origins = origins;
        self.powers = powers;
        self.version += 1;
        Ok(self.version)
    }

    /// Bumped by every successful reload.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn layer(&self, key: &LayerKey) -> Option<&Layer> {
        self.layers.get(key)
    }

    pub fn origin(&self, key: &OriginKey) -> Option<&Origin> {
        self.origins.get(key)
    }

    pub fn power(&self, key: &PowerKey) -> Option<&PowerDefinition> {
        self.powers.get(key)
    }

    pub fn contains_layer(&self, key: &LayerKey) -> bool {
        self.layers.contains_key(key)
    }

    pub fn contains_origin(&self, key: &OriginKey) -> bool {
        self.origins.contains_key(key)
    }

    /// Enabled layers sorted by `(order, key)`.
    pub fn active_layers(&self) -> Vec<(&LayerKey, &Layer)> {
        let mut active: Vec<(&LayerKey, &Layer)> =
            self.layers.iter().filter(|(_, layer)| layer.enabled).collect();
        active.sort_by(|(ka, a), (kb, b)| a.order.cmp(&b.order).then_with(|| ka.cmp(kb)));
        active
    }

    /// Candidate origins of `layer` this player may pick.
    pub fn choosable_origins<'a>(
        &'a self,
        layer: &'a Layer,
        player: &PlayerProfile,
    ) -> Vec<&'a OriginKey> {
        layer
            .origins
            .iter()
            .filter(|key| {
                self.origin(key)
                    .is_some_and(|origin| origin.is_choosable_by(player))
            })
            .collect()
    }

    /// The single origin to assign without asking, if any.
    pub fn automatic_origin<'a>(
        &'a self,
        layer: &'a Layer,
        player: &PlayerProfile,
    ) -> Option<&'a OriginKey> {
        if !layer.auto_choose {
            return None;
        }
        match self.choosable_origins(layer, player).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Options shown to the player, counting "random" as one.
    pub fn origin_option_count(&self, layer: &Layer, player: &PlayerProfile) -> usize {
        let choosable = self.choosable_origins(layer, player).len();
        choosable + usize::from(layer.allow_random && choosable > 0)
    }

    /// Expected powers of an origin: every bound referenced power plus its
    /// declared children. Unbound references contribute nothing.
    pub fn expected_powers(&self, origin: &Origin) -> BTreeSet<PowerKey> {
        let mut expected = BTreeSet::new();
        for key in origin.power_keys() {
            let Some(power) = self.power(key) else {
                continue;
            };
            expected.insert(key.clone());
            expected.extend(power.children.iter().cloned());
        }
        expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pack;

    #[test]
    fn test_empty_origin_always_registered() {
        let registries = Registries::new();
        assert!(registries.contains_origin(&OriginKey::empty()));
        assert_eq!(registries.version(), 0);
    }

    #[test]
    fn test_reload_bumps_version() {
        let mut registries = test_pack::registries();
        let v = registries.version();
        registries.reload(test_pack::pack()).unwrap();
        assert_eq!(registries.version(), v + 1);
    }

    #[test]
    fn test_reserved_origin_rejected_and_content_kept() {
        let mut registries = test_pack::registries();
        let mut pack = DataPack::default();
        pack.origins.insert(OriginKey::empty(), Origin::default());
        let err = registries.reload(pack).unwrap_err();
        assert!(matches!(err, RegistryError::ReservedOrigin(_)));
        assert!(registries.contains_layer(&test_pack::layer("origin")));
    }

    #[test]
    fn test_active_layers_in_rank_order() {
        let registries = test_pack::registries();
        let keys: Vec<String> = registries
            .active_layers()
            .iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["origins:origin", "origins:class"]);
    }

    #[test]
    fn test_unknown_layer_origins_dropped() {
        let pack = DataPack::from_json(
            r#"{
                "layers": {"origins:l": {"origins": ["origins:a", "origins:ghost"],
                                         "default_origin": "origins:ghost"},
                           "origins:haunted": {"origins": ["origins:ghost"]}},
                "origins": {"origins:a": {}}
            }"#,
        )
        .unwrap();
        let registries = Registries::from_pack(pack).unwrap();
        assert_eq!(registries.version(), 1);
        let layer = registries.layer(&test_pack::layer("l")).unwrap();
        assert_eq!(layer.origins, vec![test_pack::origin("a")]);
        assert!(layer.default_origin.is_none());
        let haunted = registries.layer(&test_pack::layer("haunted")).unwrap();
        assert!(haunted.origins.is_empty());
    }

    #[test]
    fn test_choosable_respects_conditions() {
        let registries = test_pack::registries();
        let layer = registries.layer(&test_pack::layer("origin")).unwrap();
        let plain = PlayerProfile::new(1, "Plain");
        let owl = PlayerProfile::new(2, "Owl").with_tag("night_owl");
        assert_eq!(registries.choosable_origins(layer, &plain).len(), 4);
        assert_eq!(registries.choosable_origins(layer, &owl).len(), 5);
        assert_eq!(registries.origin_option_count(layer, &plain), 5);
        assert!(registries.automatic_origin(layer, &plain).is_none());
    }

    #[test]
    fn test_automatic_origin_requires_single_choice() {
        let registries = test_pack::registries();
        let layer = registries.layer(&test_pack::layer("class")).unwrap();
        let player = PlayerProfile::new(1, "Steve");
        assert_eq!(
            registries.automatic_origin(layer, &player),
            Some(&test_pack::origin("warrior"))
        );
    }

    #[test]
    fn test_expected_powers_include_children_and_skip_unbound() {
        let registries = test_pack::registries();
        let elytrian = registries.origin(&test_pack::origin("elytrian")).unwrap();
        let expected: Vec<String> = registries
            .expected_powers(elytrian)
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(
            expected,
            vec![
                "origins:claustrophobia",
                "origins:flight",
                "origins:flight/elytra",
                "origins:flight/launch",
            ]
        );
    }
}
