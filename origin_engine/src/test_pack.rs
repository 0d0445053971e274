//! Shared fixture data pack for unit tests.

use crate::domain::DataPack;
use crate::identifier::{Identifier, LayerKey, OriginKey, PowerKey};
use crate::registry::Registries;

const DATAPACK_JSON: &str = include_str!("../tests/fixtures/datapack.json");

pub fn pack() -> DataPack {
    DataPack::from_json(DATAPACK_JSON).expect("fixture data pack must parse")
}

pub fn registries() -> Registries {
    Registries::from_pack(pack()).expect("fixture data pack must load")
}

fn id(path: &str) -> Identifier {
    Identifier::new("origins", path).expect("fixture identifier")
}

pub fn layer(path: &str) -> LayerKey {
    LayerKey::new(id(path))
}

pub fn origin(path: &str) -> OriginKey {
    OriginKey::new(id(path))
}

pub fn power(path: &str) -> PowerKey {
    PowerKey::new(id(path))
}
