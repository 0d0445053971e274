/// Origin Engine: Core Domain Types
///
/// Pure data loaded from data packs. No assignment or grant logic.

use std::collections::{BTreeMap, BTreeSet};
use std::slice;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::identifier::{LayerKey, OriginKey, PowerKey};

// ── Definitions ────────────────────────────────────────────────────

/// An independent axis of origin selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layer {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Rank among active layers; lower resolves first.
    #[serde(default)]
    pub order: i32,
    /// Candidate origins offered on this layer.
    #[serde(default)]
    pub origins: Vec<OriginKey>,
    #[serde(default)]
    pub default_origin: Option<OriginKey>,
    /// Assign automatically when exactly one origin is choosable.
    #[serde(default)]
    pub auto_choose: bool,
    /// Offer a "random" option alongside the candidates.
    #[serde(default)]
    pub allow_random: bool,
}

impl Layer {
    /// Default origin, unless absent or the empty sentinel.
    pub fn effective_default(&self) -> Option<&OriginKey> {
        self.default_origin.as_ref().filter(|origin| !origin.is_empty())
    }
}

fn default_true() -> bool {
    true
}

/// Either a single power or a group of powers referenced by an origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PowerReference {
    Single(PowerKey),
    Group(Vec<PowerKey>),
}

impl PowerReference {
    pub fn keys(&self) -> &[PowerKey] {
        match self {
            PowerReference::Single(key) => slice::from_ref(key),
            PowerReference::Group(keys) => keys,
        }
    }
}

/// A selectable archetype granting a bundle of powers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Origin {
    #[serde(default)]
    pub powers: Vec<PowerReference>,
    /// Never offered for selection (only assignable directly).
    #[serde(default)]
    pub unchoosable: bool,
    #[serde(default)]
    pub condition: Option<OriginCondition>,
}

impl Origin {
    /// Every referenced power key, in declaration order.
    pub fn power_keys(&self) -> impl Iterator<Item = &PowerKey> {
        self.powers.iter().flat_map(PowerReference::keys)
    }

    pub fn is_valid_for(&self, player: &PlayerProfile) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.test(player))
    }

    /// Offered on a layer to this player.
    pub fn is_choosable_by(&self, player: &PlayerProfile) -> bool {
        !self.unchoosable && self.is_valid_for(player)
    }
}

/// A power definition. Children are granted alongside their parent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PowerDefinition {
    #[serde(default)]
    pub children: Vec<PowerKey>,
}

/// Per-player validity predicate of an origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum OriginCondition {
    HasTag { tag: String },
    Not { condition: Box<OriginCondition> },
    AllOf { conditions: Vec<OriginCondition> },
    AnyOf { conditions: Vec<OriginCondition> },
}

impl OriginCondition {
    pub fn test(&self, player: &PlayerProfile) -> bool {
        match self {
            OriginCondition::HasTag { tag } => player.tags.contains(tag),
            OriginCondition::Not { condition } => !condition.test(player),
            OriginCondition::AllOf { conditions } => conditions.iter().all(|c| c.test(player)),
            OriginCondition::AnyOf { conditions } => conditions.iter().any(|c| c.test(player)),
        }
    }
}

// ── Players ────────────────────────────────────────────────────────

/// Identity of the entity owning an origin container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlayerProfile {
    pub entity_id: i32,
    pub name: String,
    pub tags: BTreeSet<String>,
}

impl PlayerProfile {
    pub fn new(entity_id: i32, name: &str) -> Self {
        Self {
            entity_id,
            name: name.to_string(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }
}

/// Execution context of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Authoritative: owns ground truth and broadcasts snapshots.
    Server,
    /// Passive observer: only applies received snapshots.
    Client,
}

// ── Data packs ─────────────────────────────────────────────────────

/// The full registry content delivered by one (re)load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataPack {
    #[serde(default)]
    pub layers: BTreeMap<LayerKey, Layer>,
    #[serde(default)]
    pub origins: BTreeMap<OriginKey, Origin>,
    #[serde(default)]
    pub powers: BTreeMap<PowerKey, PowerDefinition>,
}

impl DataPack {
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_reference_accepts_single_and_group() {
        let origin: Origin = serde_json::from_str(
            r#"{"powers": ["origins:a", ["origins:b", "origins:c"]]}"#,
        )
        .unwrap();
        let keys: Vec<String> = origin.power_keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["origins:a", "origins:b", "origins:c"]);
    }

    #[test]
    fn test_layer_defaults() {
        let layer: Layer = serde_json::from_str("{}").unwrap();
        assert!(layer.enabled);
        assert_eq!(layer.order, 0);
        assert!(layer.effective_default().is_none());
    }

    #[test]
    fn test_empty_default_is_ignored() {
        let layer: Layer =
            serde_json::from_str(r#"{"default_origin": "origins:empty"}"#).unwrap();
        assert!(layer.default_origin.is_some());
        assert!(layer.effective_default().is_none());
    }

    #[test]
    fn test_conditions() {
        let condition: OriginCondition = serde_json::from_str(
            r#"{"type": "all_of", "conditions": [
                {"type": "has_tag", "tag": "night_owl"},
                {"type": "not", "condition": {"type": "has_tag", "tag": "sunlit"}}
            ]}"#,
        )
        .unwrap();
        let owl = PlayerProfile::new(1, "Owl").with_tag("night_owl");
        let sunlit_owl = owl.clone().with_tag("sunlit");
        assert!(condition.test(&owl));
        assert!(!condition.test(&sunlit_owl));
        assert!(!condition.test(&PlayerProfile::new(2, "Plain")));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(DataPack::from_json(r#"{"layers": {}, "bogus": 1}"#).is_err());
        assert!(serde_json::from_str::<Origin>(r#"{"impact": 3}"#).is_err());
    }
}
