/// Origin Engine: Invariant Checks
///
/// Non-panicking validation of a container against its ledger. Meaningful
/// after reconciliation has run for the current registry version.

use crate::container::OriginContainer;
use crate::error::InvariantViolation;
use crate::identifier::power_source;
use crate::power::PowerLedger;
use crate::registry::Registries;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Returns the first violation found, `Ok(())` if all checks pass.
pub fn try_validate_invariants(
    container: &OriginContainer,
    registries: &Registries,
    ledger: &dyn PowerLedger,
) -> Result<(), InvariantViolation> {
    check_registered_entries(container, registries)?;
    check_reconciliation_closure(container, registries, ledger)?;
    Ok(())
}

/// Every violation, in layer order.
pub fn collect_violations(
    container: &OriginContainer,
    registries: &Registries,
    ledger: &dyn PowerLedger,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    for (layer, origin) in container.origins() {
        if !registries.contains_layer(&layer) {
            violations.push(InvariantViolation::UnregisteredLayer(layer));
            continue;
        }
        let Some(definition) = registries.origin(&origin) else {
            violations.push(InvariantViolation::UnregisteredOrigin { layer, origin });
            continue;
        };
        let source = power_source(&origin);
        let held = ledger.powers_from_source(&source);
        let expected = registries.expected_powers(definition);
        for power in expected.difference(&held) {
            violations.push(InvariantViolation::MissingGrant {
                power_source: source.clone(),
                power: power.clone(),
            });
        }
        for power in held.difference(&expected) {
            violations.push(InvariantViolation::UnexpectedGrant {
                power_source: source.clone(),
                power: power.clone(),
            });
        }
    }
    violations
}

// ---------------------------------------------------------------------------
// Individual checks (private)
// ---------------------------------------------------------------------------

/// Every assigned layer and origin is registered.
fn check_registered_entries(
    container: &OriginContainer,
    registries: &Registries,
) -> Result<(), InvariantViolation> {
    for (layer, origin) in container.origins() {
        if !registries.contains_layer(&layer) {
            return Err(InvariantViolation::UnregisteredLayer(layer));
        }
        if !registries.contains_origin(&origin) {
            return Err(InvariantViolation::UnregisteredOrigin { layer, origin });
        }
    }
    Ok(())
}

/// Grants under each assigned origin's source equal its expected powers.
fn check_reconciliation_closure(
    container: &OriginContainer,
    registries: &Registries,
    ledger: &dyn PowerLedger,
) -> Result<(), InvariantViolation> {
    match collect_violations(container, registries, ledger).into_iter().next() {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}
