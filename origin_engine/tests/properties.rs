//! Property tests: idempotence, monotonicity, closure and isolation over
//! arbitrary assignment sequences against the fixture data pack.

use std::fs;

use proptest::prelude::*;

use origin_engine::container::{OriginContainer, OriginContext};
use origin_engine::domain::{DataPack, PlayerProfile};
use origin_engine::events::NoopEvents;
use origin_engine::hashing::{canonical_hash, ledger_hash};
use origin_engine::identifier::{LayerKey, OriginKey, PowerKey, PowerSource};
use origin_engine::invariants::try_validate_invariants;
use origin_engine::power::{PowerContainer, PowerLedger};
use origin_engine::registry::Registries;

const LAYERS: &[&str] = &["origin", "class", "nowhere"];
const ORIGINS: &[&str] = &[
    "human", "merling", "blazeborn", "elytrian", "phantom", "arachnid", "warrior", "ghost", "empty",
];

fn registries() -> Registries {
    let json = fs::read_to_string("tests/fixtures/datapack.json").expect("read fixture");
    Registries::from_pack(DataPack::from_json(&json).expect("parse fixture")).expect("load fixture")
}

fn layer(i: usize) -> LayerKey {
    LayerKey::parse(&format!("origins:{}", LAYERS[i])).unwrap()
}

fn origin(i: usize) -> OriginKey {
    OriginKey::parse(&format!("origins:{}", ORIGINS[i])).unwrap()
}

fn assignments() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..LAYERS.len(), 0..ORIGINS.len()), 0..24)
}

fn apply(
    registries: &Registries,
    ledger: &mut PowerContainer,
    container: &OriginContainer,
    ops: &[(usize, usize)],
) {
    let mut ctx = OriginContext::server(registries, &NoopEvents).with_powers(ledger);
    for &(l, o) in ops {
        let _ = container.set_origin(&mut ctx, &layer(l), &origin(o));
    }
}

proptest! {
    #[test]
    fn repeating_an_assignment_changes_nothing(ops in assignments(), l in 0..2usize, o in 0..7usize) {
        let registries = registries();
        let mut ledger = PowerContainer::new();
        let container = OriginContainer::new(PlayerProfile::new(1, "Prop"));
        apply(&registries, &mut ledger, &container, &ops);
        apply(&registries, &mut ledger, &container, &[(l, o)]);
        let assignment = canonical_hash(&container);
        let grants = ledger_hash(&ledger);

        apply(&registries, &mut ledger, &container, &[(l, o)]);
        prop_assert_eq!(canonical_hash(&container), assignment);
        prop_assert_eq!(ledger_hash(&ledger), grants);
    }

    #[test]
    fn had_all_origins_never_reverts(ops in assignments()) {
        let registries = registries();
        let mut ledger = PowerContainer::new();
        let container = OriginContainer::new(PlayerProfile::new(1, "Prop"));
        let mut seen = false;
        for op in &ops {
            apply(&registries, &mut ledger, &container, std::slice::from_ref(op));
            if seen {
                prop_assert!(container.had_all_origins());
            }
            seen = container.had_all_origins();
        }
        container.apply_cleanup(&registries, &mut ledger);
        prop_assert_eq!(container.had_all_origins(), seen);
    }

    #[test]
    fn cleanup_restores_closure(ops in assignments()) {
        let registries = registries();
        let mut ledger = PowerContainer::new();
        let container = OriginContainer::new(PlayerProfile::new(1, "Prop"));
        apply(&registries, &mut ledger, &container, &ops);
        container.apply_cleanup(&registries, &mut ledger);
        prop_assert!(try_validate_invariants(&container, &registries, &ledger).is_ok());
        prop_assert!(container.apply_cleanup(&registries, &mut ledger).is_clean());
    }

    #[test]
    fn foreign_sources_are_never_touched(ops in assignments()) {
        let registries = registries();
        let mut ledger = PowerContainer::new();
        let foreign = PowerSource::parse("apoli:command").unwrap();
        let shared = PowerKey::parse("origins:water_breathing").unwrap();
        let own = PowerKey::parse("apoli:glow").unwrap();
        ledger.add_power(shared.clone(), foreign.clone());
        ledger.add_power(own.clone(), foreign.clone());

        let container = OriginContainer::new(PlayerProfile::new(1, "Prop"));
        apply(&registries, &mut ledger, &container, &ops);
        container.apply_cleanup(&registries, &mut ledger);

        let held = ledger.powers_from_source(&foreign);
        prop_assert_eq!(held.len(), 2);
        prop_assert!(held.contains(&shared));
        prop_assert!(held.contains(&own));
    }
}
