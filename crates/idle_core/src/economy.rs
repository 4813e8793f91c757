//! Economy model: pure, stateless formulas.
//!
//! Every function here is total over its documented domain and takes the
//! current state as parameters. Nothing in this module mutates state or
//! reads a clock; the [`Engine`](crate::engine::Engine) composes these
//! formulas into transitions.

use crate::data::{UpgradeCatalog, UpgradeDefinition, UpgradeKind};
use crate::math::{finite_or_zero, round_to_precision};
use crate::state::UpgradeState;

/// Cost multiplier applied per owned level.
pub const GROWTH_FACTOR: f64 = 1.15;

/// Idle baseline income added to every production rate.
pub const BASE_PRODUCTION_FLOOR: f64 = 0.1;

/// Per-point production bonus base for prestige points.
pub const PRESTIGE_PRODUCTION_BASE: f64 = 1.02;

/// Per-point manual-action bonus base for prestige points.
pub const PRESTIGE_MANUAL_BASE: f64 = 1.015;

/// Currency needed before a prestige awards anything.
pub const PRESTIGE_THRESHOLD: f64 = 1_000_000.0;

/// Scale of the cube-root prestige award curve.
pub const PRESTIGE_GAIN_SCALE: f64 = 5.0;

/// Cost of buying the level after `current_level`.
///
/// `floor(base_cost * 1.15^current_level)`. Overflows to infinity for
/// absurd levels, which no finite balance can afford.
#[must_use]
pub fn purchase_cost(definition: &UpgradeDefinition, current_level: u32) -> f64 {
    (definition.base_cost * GROWTH_FACTOR.powf(f64::from(current_level))).floor()
}

/// Total cost of `quantity` consecutive levels starting at `current_level`.
#[must_use]
pub fn bulk_purchase_cost(definition: &UpgradeDefinition, current_level: u32, quantity: u32) -> f64 {
    let mut total = 0.0;
    for i in 0..quantity {
        total += purchase_cost(definition, current_level.saturating_add(i));
        if !total.is_finite() {
            return f64::INFINITY;
        }
    }
    total
}

/// Largest quantity whose bulk cost fits in `available_currency`.
///
/// Greedy level-by-level accumulation; costs never decrease with level,
/// so taking the cheapest remaining level first is optimal. A NaN balance
/// affords nothing.
#[must_use]
pub fn max_affordable_quantity(
    definition: &UpgradeDefinition,
    current_level: u32,
    available_currency: f64,
) -> u32 {
    if available_currency.is_nan() {
        return 0;
    }

    let mut quantity: u32 = 0;
    let mut total = 0.0;
    while quantity < u32::MAX {
        let next = purchase_cost(definition, current_level.saturating_add(quantity));
        if !next.is_finite() || total + next > available_currency {
            break;
        }
        total += next;
        quantity += 1;
    }
    quantity
}

/// Production from automatic upgrades plus the idle floor, before prestige.
///
/// Upgrade entries without a catalog definition contribute nothing.
#[must_use]
pub fn base_production_rate(upgrades: &[UpgradeState], catalog: &UpgradeCatalog) -> f64 {
    let from_upgrades: f64 = upgrades
        .iter()
        .filter_map(|u| catalog.get(u.id).map(|def| (def, u.level)))
        .filter(|(def, _)| def.is_production())
        .map(|(def, level)| def.effect * f64::from(level))
        .sum();
    from_upgrades + BASE_PRODUCTION_FLOOR
}

/// Production multiplier granted by prestige points: `1.02^points`.
#[must_use]
pub fn prestige_production_multiplier(prestige_points: u64) -> f64 {
    PRESTIGE_PRODUCTION_BASE.powf(prestige_points as f64)
}

/// Manual-action multiplier granted by prestige points: `1.015^points`.
#[must_use]
pub fn prestige_manual_multiplier(prestige_points: u64) -> f64 {
    PRESTIGE_MANUAL_BASE.powf(prestige_points as f64)
}

/// Effective production rate, rounded to the engine precision.
#[must_use]
pub fn compute_production_rate(
    upgrades: &[UpgradeState],
    catalog: &UpgradeCatalog,
    prestige_points: u64,
) -> f64 {
    let rate = base_production_rate(upgrades, catalog) * prestige_production_multiplier(prestige_points);
    round_to_precision(finite_or_zero(rate, "production_rate"))
}

/// Currency granted by one manual action.
///
/// `manual_effect * (1 + manual_level) * 1.015^points`, rounded.
#[must_use]
pub fn manual_action_value(
    upgrades: &[UpgradeState],
    catalog: &UpgradeCatalog,
    prestige_points: u64,
) -> f64 {
    let manual = catalog.manual();
    let level = upgrades
        .iter()
        .find(|u| u.id == manual.id)
        .map_or(0, |u| u.level);
    let value =
        manual.effect * (1.0 + f64::from(level)) * prestige_manual_multiplier(prestige_points);
    round_to_precision(finite_or_zero(value, "manual_action_value"))
}

/// Production-rate increase from buying one more level of `definition`.
///
/// Zero for the manual upgrade, which does not feed production.
#[must_use]
pub fn level_production_gain(definition: &UpgradeDefinition, prestige_points: u64) -> f64 {
    match definition.kind {
        UpgradeKind::Production => {
            definition.effect * prestige_production_multiplier(prestige_points)
        }
        UpgradeKind::Manual => 0.0,
    }
}

/// Prestige points awarded for resetting at `current_currency`.
///
/// Zero below [`PRESTIGE_THRESHOLD`]; otherwise
/// `floor(5 * cbrt(currency / threshold))`. The boundary is inclusive.
#[must_use]
pub fn prestige_gain(current_currency: f64) -> u64 {
    if !current_currency.is_finite() || current_currency < PRESTIGE_THRESHOLD {
        return 0;
    }
    (PRESTIGE_GAIN_SCALE * (current_currency / PRESTIGE_THRESHOLD).cbrt()).floor() as u64
}
