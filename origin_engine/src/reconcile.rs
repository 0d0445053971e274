/// Origin Engine: Reconciliation
///
/// Repairs drift between the power ledger and the current registry
/// content after a reload. Only grants tagged with an assigned origin's
/// source are ever touched.

use std::collections::BTreeSet;

use tracing::debug;

use crate::container::OriginContainer;
use crate::identifier::{power_source, OriginKey, PowerKey};
use crate::power::PowerLedger;
use crate::registry::Registries;

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries dropped because their layer no longer exists.
    pub removed_layers: usize,
    /// Entries reset to the empty origin because their origin no longer exists.
    pub cleared_origins: usize,
    pub revoked_powers: usize,
    pub granted_powers: usize,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

impl OriginContainer {
    /// Reconcile every recorded `(layer, origin)` entry:
    ///
    ///   1. layer gone  → drop the entry, revoke the origin's source
    ///   2. origin gone → revoke the source, keep the entry as the empty origin
    ///   3. otherwise   → revoke unexpected grants, add missing ones
    pub fn apply_cleanup(
        &self,
        registries: &Registries,
        ledger: &mut dyn PowerLedger,
    ) -> CleanupReport {
        let player = self.owner().name.as_str();
        let mut report = CleanupReport::default();
        let mut layers = self.layers().write();
        let entries: Vec<_> = layers
            .iter()
            .map(|(layer, origin)| (layer.clone(), origin.clone()))
            .collect();

        for (layer, origin) in entries {
            let source = power_source(&origin);

            if !registries.contains_layer(&layer) {
                layers.remove(&layer);
                report.revoked_powers += ledger.remove_all_powers_from_source(&source);
                report.removed_layers += 1;
                debug!(%layer, player, "CLEANUP: removed missing layer");
                continue;
            }

            let Some(definition) = registries.origin(&origin) else {
                report.revoked_powers += ledger.remove_all_powers_from_source(&source);
                layers.insert(layer, OriginKey::empty());
                report.cleared_origins += 1;
                debug!(%origin, player, "CLEANUP: removed missing origin");
                continue;
            };

            let current = ledger.powers_from_source(&source);
            let expected = registries.expected_powers(definition);

            let to_remove: BTreeSet<&PowerKey> = current.difference(&expected).collect();
            let to_add: BTreeSet<&PowerKey> = expected.difference(&current).collect();

            if !to_remove.is_empty() {
                for power in &to_remove {
                    ledger.remove_power(power, &source);
                }
                report.revoked_powers += to_remove.len();
                debug!(count = to_remove.len(), %origin, player, "CLEANUP: revoked removed powers");
            }
            if !to_add.is_empty() {
                for power in &to_add {
                    ledger.add_power((*power).clone(), source.clone());
                }
                report.granted_powers += to_add.len();
                debug!(count = to_add.len(), %origin, player, "CLEANUP: granted missing powers");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::OriginContext;
    use crate::domain::{DataPack, PlayerProfile, PowerDefinition, PowerReference};
    use crate::events::NoopEvents;
    use crate::identifier::PowerSource;
    use crate::power::PowerContainer;
    use crate::test_pack::{self, layer, origin, power};

    fn assigned(
        registries: &Registries,
        ledger: &mut PowerContainer,
        picks: &[(&str, &str)],
    ) -> OriginContainer {
        let container = OriginContainer::new(PlayerProfile::new(3, "Alex"));
        let mut ctx = OriginContext::server(registries, &NoopEvents).with_powers(ledger);
        for (l, o) in picks {
            container.set_origin(&mut ctx, &layer(l), &origin(o)).unwrap();
        }
        container
    }

    fn from_source(ledger: &PowerContainer, o: &str) -> BTreeSet<PowerKey> {
        ledger.powers_from_source(&power_source(&origin(o)))
    }

    #[test]
    fn test_consistent_state_is_untouched() {
        let registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let container = assigned(&registries, &mut ledger, &[("origin", "elytrian")]);
        let before = ledger.clone();
        let report = container.apply_cleanup(&registries, &mut ledger);
        assert!(report.is_clean());
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_missing_layer_removes_entry() {
        let mut registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let container = assigned(
            &registries,
            &mut ledger,
            &[("origin", "merling"), ("class", "warrior")],
        );

        let mut pack = test_pack::pack();
        pack.layers.remove(&layer("class"));
        registries.reload(pack).unwrap();

        let report = container.apply_cleanup(&registries, &mut ledger);
        assert_eq!(report.removed_layers, 1);
        assert_eq!(report.revoked_powers, 1);
        assert!(!container.origins().contains_key(&layer("class")));
        assert!(from_source(&ledger, "warrior").is_empty());
        assert_eq!(from_source(&ledger, "merling").len(), 2);
    }

    #[test]
    fn test_missing_origin_resets_to_empty() {
        let mut registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let container = assigned(&registries, &mut ledger, &[("origin", "blazeborn")]);

        let mut pack = test_pack::pack();
        pack.origins.remove(&origin("blazeborn"));
        registries.reload(pack).unwrap();

        let report = container.apply_cleanup(&registries, &mut ledger);
        assert_eq!(report.cleared_origins, 1);
        assert_eq!(report.revoked_powers, 2);
        let origins = container.origins();
        assert!(origins[&layer("origin")].is_empty());
        assert!(from_source(&ledger, "blazeborn").is_empty());
    }

    #[test]
    fn test_redefined_origin_is_diffed() {
        let mut registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let container = assigned(&registries, &mut ledger, &[("origin", "merling")]);

        let mut pack: DataPack = test_pack::pack();
        pack.powers.insert(power("swim_speed"), PowerDefinition::default());
        pack.origins.get_mut(&origin("merling")).unwrap().powers = vec![
            PowerReference::Single(power("water_breathing")),
            PowerReference::Single(power("swim_speed")),
        ];
        registries.reload(pack).unwrap();

        let report = container.apply_cleanup(&registries, &mut ledger);
        assert_eq!(report.revoked_powers, 1);
        assert_eq!(report.granted_powers, 1);
        let held = from_source(&ledger, "merling");
        assert!(held.contains(&power("swim_speed")));
        assert!(!held.contains(&power("aqua_affinity")));
    }

    #[test]
    fn test_other_sources_untouched() {
        let registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let foreign = PowerSource::parse("apoli:item_bonus").unwrap();
        ledger.add_power(power("aqua_affinity"), foreign.clone());
        ledger.add_power(power("climbing"), foreign.clone());

        let container = assigned(&registries, &mut ledger, &[("origin", "merling")]);
        ledger.add_power(power("strength"), power_source(&origin("merling")));
        container.apply_cleanup(&registries, &mut ledger);

        assert!(ledger.has_power(&power("aqua_affinity"), &foreign));
        assert!(ledger.has_power(&power("climbing"), &foreign));
        assert!(!from_source(&ledger, "merling").contains(&power("strength")));
    }

    #[test]
    fn test_lost_grants_are_restored() {
        let registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let container = assigned(&registries, &mut ledger, &[("origin", "elytrian")]);
        ledger.remove_all_powers_from_source(&power_source(&origin("elytrian")));

        let report = container.apply_cleanup(&registries, &mut ledger);
        assert_eq!(report.granted_powers, 4);
        assert!(from_source(&ledger, "elytrian").contains(&power("flight/launch")));
    }

    #[test]
    fn test_tick_runs_cleanup_once_per_reload() {
        let mut registries = test_pack::registries();
        let mut ledger = PowerContainer::new();
        let container = assigned(&registries, &mut ledger, &[("origin", "merling")]);
        {
            let mut ctx = OriginContext::server(&registries, &NoopEvents).with_powers(&mut ledger);
            container.tick(&mut ctx);
        }
        assert!(!container.cleanup_pending());

        let mut pack = test_pack::pack();
        pack.origins.remove(&origin("merling"));
        registries.reload(pack).unwrap();
        container.on_reload();
        assert!(container.cleanup_pending());

        let mut ctx = OriginContext::server(&registries, &NoopEvents).with_powers(&mut ledger);
        container.tick(&mut ctx);
        assert!(container.get_origin(&layer("origin")).is_empty());
        assert!(from_source(&ledger, "merling").is_empty());
    }
}
