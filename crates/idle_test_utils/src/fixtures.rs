//! Test fixtures and helpers.
//!
//! Pre-built catalogs, engines, and game states for consistent testing.
//! States are built through [`GameSnapshot::restore`], the only way to
//! construct an arbitrary state from outside `idle_core`.

use idle_core::data::{UpgradeCatalog, UpgradeDefinition, UpgradeId, UpgradeKind};
use idle_core::engine::Engine;
use idle_core::persistence::GameSnapshot;
use idle_core::state::{GameState, Timestamp, UpgradeState};

/// Id of the production upgrade in [`flat_rate_catalog`].
pub const WELL: UpgradeId = UpgradeId(2);

/// Engine over the shipped catalog.
#[must_use]
pub fn standard_engine() -> Engine {
    Engine::new(UpgradeCatalog::standard())
}

/// Two-entry catalog whose production upgrade yields `effect` per level.
///
/// With one level of [`WELL`] the production rate is `effect + 0.1`, which
/// makes round rates easy to set up (`effect = 4.9` gives exactly 5).
///
/// # Panics
///
/// Panics if `effect` is not a positive finite number.
#[must_use]
pub fn flat_rate_catalog(effect: f64) -> UpgradeCatalog {
    UpgradeCatalog::new(vec![
        UpgradeDefinition::new(1, "Tap", UpgradeKind::Manual, 10.0, 1.0),
        UpgradeDefinition::new(WELL.0, "Well", UpgradeKind::Production, 50.0, effect),
    ])
    .expect("fixture catalog is valid")
}

/// Engine and state producing exactly `rate` currency per second, with
/// zero currency, at `now`.
///
/// # Panics
///
/// Panics if `rate` is not above the 0.1 production floor.
#[must_use]
pub fn engine_with_rate(rate: f64, now: Timestamp) -> (Engine, GameState) {
    let engine = Engine::new(flat_rate_catalog(rate - 0.1));
    let state = state_with(&engine, 0.0, &[(WELL, 1)], now);
    (engine, state)
}

/// State with the given balance and upgrade levels, everything else default.
///
/// # Panics
///
/// Panics if the inputs do not form a valid snapshot.
#[must_use]
pub fn state_with(
    engine: &Engine,
    currency: f64,
    levels: &[(UpgradeId, u32)],
    now: Timestamp,
) -> GameState {
    let snapshot = GameSnapshot {
        currency,
        last_update_timestamp: Some(now),
        upgrades: levels
            .iter()
            .map(|&(id, level)| UpgradeState { id, level })
            .collect(),
        ..GameSnapshot::default()
    };
    snapshot
        .restore(engine, now)
        .expect("fixture snapshot is valid")
}

/// Fresh state holding `currency`.
#[must_use]
pub fn state_with_currency(engine: &Engine, currency: f64) -> GameState {
    state_with(engine, currency, &[], Timestamp::ZERO)
}

/// A mid-game standard-catalog state: some levels in everything, prestige
/// points banked, and a few history samples.
#[must_use]
pub fn mid_game_state(engine: &Engine) -> GameState {
    let mut state = state_with(
        engine,
        54_321.25,
        &[
            (UpgradeId(1), 12),
            (UpgradeId(2), 20),
            (UpgradeId(3), 7),
            (UpgradeId(4), 1),
        ],
        Timestamp::from_millis(1_700_000_000_000),
    );
    for _ in 0..3 {
        state = engine.advance(&state, 10.0);
        state = engine.sample_history(&state);
    }
    state
}
