//! Game state machine.
//!
//! [`Engine`] holds the immutable upgrade catalog and applies transitions
//! to [`GameState`] values. Every transition borrows the input state and
//! returns a new one, so a rejected command leaves its input untouched
//! and callers can never observe a half-applied change.
//!
//! # Determinism
//!
//! The engine never reads a clock. Time enters only as an explicit elapsed
//! duration, and `last_update` moves forward by exactly that duration.
//!
//! # Example
//!
//! ```
//! use idle_core::data::{UpgradeCatalog, UpgradeId};
//! use idle_core::engine::{Engine, PurchaseQuantity};
//! use idle_core::state::Timestamp;
//!
//! let engine = Engine::new(UpgradeCatalog::standard());
//! let state = engine.new_game(Timestamp::from_millis(0));
//!
//! // Ten clicks pay for the first Clicker level.
//! let state = (0..10).fold(state, |s, _| engine.manual_action(&s));
//! let state = engine
//!     .purchase(&state, UpgradeId(1), PurchaseQuantity::Count(1))
//!     .expect("affordable");
//! assert_eq!(state.level(UpgradeId(1)), Some(1));
//!
//! let state = engine.advance(&state, 10.0);
//! assert!(state.currency() > 0.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::data::{UpgradeCatalog, UpgradeId};
use crate::economy::{
    bulk_purchase_cost, compute_production_rate, manual_action_value, max_affordable_quantity,
    prestige_gain, purchase_cost, PRESTIGE_THRESHOLD,
};
use crate::error::Rejection;
use crate::math::{finite_or_zero, round_to_precision, sanitize_elapsed, spendable};
use crate::state::{GameState, HistorySample, Timestamp};

/// Gaps at or below this many seconds are not credited as offline time.
pub const OFFLINE_THRESHOLD_SECONDS: f64 = 5.0;

/// How many levels a purchase asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseQuantity {
    /// An exact number of levels.
    Count(u32),
    /// As many levels as the balance affords.
    Max,
}

impl PurchaseQuantity {
    /// Map a raw requested count; negative requests become `Count(0)`,
    /// which the engine rejects as an invalid quantity.
    #[must_use]
    pub fn from_requested(requested: i64) -> Self {
        Self::Count(u32::try_from(requested.max(0)).unwrap_or(u32::MAX))
    }
}

/// Earnings credited by an offline catch-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OfflineReport {
    /// Length of the gap that was credited.
    pub elapsed_seconds: f64,
    /// Currency credited for the gap.
    pub earnings: f64,
}

/// The game state machine.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: UpgradeCatalog,
}

impl Engine {
    /// Create an engine over a validated catalog.
    #[must_use]
    pub fn new(catalog: UpgradeCatalog) -> Self {
        Self { catalog }
    }

    /// The catalog every state of this engine is keyed against.
    #[must_use]
    pub fn catalog(&self) -> &UpgradeCatalog {
        &self.catalog
    }

    /// Default state: no currency, every level zero, no prestige.
    #[must_use]
    pub fn new_game(&self, now: Timestamp) -> GameState {
        let mut state = GameState::fresh(&self.catalog, now, 0.0);
        state.production_rate = self.rate_for(&state);
        state
    }

    /// Apply `elapsed_seconds` of automatic production.
    ///
    /// Negative or non-finite durations are treated as zero.
    #[must_use]
    pub fn advance(&self, state: &GameState, elapsed_seconds: f64) -> GameState {
        let elapsed = sanitize_elapsed(elapsed_seconds);
        let increment = round_to_precision(finite_or_zero(
            state.production_rate * elapsed,
            "accrual_increment",
        ));

        let mut next = state.clone();
        credit(&mut next, increment);
        next.last_update = state.last_update.advanced_by_secs(elapsed);
        self.validated(next)
    }

    /// Catch up after a gap, crediting it only if it exceeds
    /// [`OFFLINE_THRESHOLD_SECONDS`].
    ///
    /// Returns a report when earnings were credited.
    #[must_use]
    pub fn reconcile(
        &self,
        state: &GameState,
        elapsed_seconds_since_last_seen: f64,
    ) -> (GameState, Option<OfflineReport>) {
        let elapsed = sanitize_elapsed(elapsed_seconds_since_last_seen);
        let mut next = state.clone();
        next.last_update = state.last_update.advanced_by_secs(elapsed);

        if elapsed <= OFFLINE_THRESHOLD_SECONDS {
            tracing::debug!(elapsed, "Offline gap below threshold, not credited");
            return (self.validated(next), None);
        }

        let earnings = round_to_precision(finite_or_zero(
            state.production_rate * elapsed,
            "offline_earnings",
        ));
        if earnings <= 0.0 {
            return (self.validated(next), None);
        }

        credit(&mut next, earnings);
        tracing::info!(elapsed, earnings, "Credited offline earnings");
        (
            self.validated(next),
            Some(OfflineReport {
                elapsed_seconds: elapsed,
                earnings,
            }),
        )
    }

    /// Buy levels of an upgrade.
    ///
    /// Affordability compares the cost against the floored balance.
    pub fn purchase(
        &self,
        state: &GameState,
        upgrade: UpgradeId,
        quantity: PurchaseQuantity,
    ) -> Result<GameState, Rejection> {
        let definition = self
            .catalog
            .get(upgrade)
            .ok_or(Rejection::UnknownUpgrade(upgrade))?;
        let level = state
            .level(upgrade)
            .ok_or(Rejection::UnknownUpgrade(upgrade))?;
        let available = spendable(state.currency);

        let quantity = match quantity {
            PurchaseQuantity::Count(0) => {
                return Err(Rejection::InvalidQuantity {
                    upgrade,
                    requested: 0,
                })
            }
            PurchaseQuantity::Count(n) => n,
            PurchaseQuantity::Max => {
                match max_affordable_quantity(definition, level, available) {
                    0 => {
                        return Err(Rejection::InsufficientFunds {
                            required: purchase_cost(definition, level),
                            available,
                        })
                    }
                    n => n,
                }
            }
        };

        let cost = bulk_purchase_cost(definition, level, quantity);
        if available < cost {
            return Err(Rejection::InsufficientFunds {
                required: cost,
                available,
            });
        }

        let mut next = state.clone();
        if let Some(entry) = next.upgrade_mut(upgrade) {
            entry.level = level.saturating_add(quantity);
        }
        next.currency = round_to_precision(state.currency - cost).max(0.0);
        next.production_rate = self.rate_for(&next);

        tracing::debug!(
            upgrade = %upgrade,
            name = %definition.name,
            quantity,
            cost,
            balance = next.currency,
            "Purchased upgrade levels"
        );
        Ok(self.validated(next))
    }

    /// Perform one manual action. Never fails.
    #[must_use]
    pub fn manual_action(&self, state: &GameState) -> GameState {
        let value = manual_action_value(&state.upgrades, &self.catalog, state.prestige_points);

        let mut next = state.clone();
        next.currency = round_to_precision(state.currency + value);
        next.stats.total_clicks = state.stats.total_clicks.saturating_add(1);
        next.stats.manual_earnings = round_to_precision(state.stats.manual_earnings + value);
        next.stats.total_earnings = round_to_precision(state.stats.total_earnings + value);
        next.stats.highest_currency_ever_held =
            state.stats.highest_currency_ever_held.max(next.currency);
        self.validated(next)
    }

    /// Trade the current run for prestige points.
    ///
    /// Currency and levels reset; prestige points, cumulative statistics,
    /// history, and the session start survive.
    pub fn prestige(&self, state: &GameState) -> Result<GameState, Rejection> {
        let gain = prestige_gain(state.currency);
        if state.currency < PRESTIGE_THRESHOLD || gain == 0 {
            return Err(Rejection::InsufficientFunds {
                required: PRESTIGE_THRESHOLD,
                available: state.currency,
            });
        }

        let mut next = state.clone();
        next.prestige_points = state.prestige_points.saturating_add(gain);
        next.prestige_count = state.prestige_count.saturating_add(1);
        for upgrade in &mut next.upgrades {
            upgrade.level = 0;
        }
        next.currency = 0.0;
        next.production_rate = self.rate_for(&next);

        tracing::info!(
            gain,
            prestige_points = next.prestige_points,
            prestige_count = next.prestige_count,
            "Prestiged"
        );
        Ok(self.validated(next))
    }

    /// Discard everything and start over, prestige included.
    ///
    /// The fresh save starts at the discarded state's `last_update`.
    #[must_use]
    pub fn reset_all(&self, state: &GameState) -> GameState {
        tracing::info!(
            prestige_points = state.prestige_points,
            total_earnings = state.stats.total_earnings,
            "Full reset"
        );
        self.new_game(state.last_update)
    }

    /// Append `(last_update, total_earnings)` to the history ring.
    #[must_use]
    pub fn sample_history(&self, state: &GameState) -> GameState {
        let mut next = state.clone();
        next.history.push(HistorySample {
            timestamp: state.last_update,
            total_earnings: state.stats.total_earnings,
        });
        next
    }

    /// Production rate the economy model assigns to `state`.
    #[must_use]
    pub fn rate_for(&self, state: &GameState) -> f64 {
        compute_production_rate(&state.upgrades, &self.catalog, state.prestige_points)
    }

    /// List every state invariant `state` violates.
    #[must_use]
    pub fn check_invariants(&self, state: &GameState) -> Vec<String> {
        let mut violations = Vec::new();

        if !(state.currency.is_finite() && state.currency >= 0.0) {
            violations.push(format!("currency {} is not a finite non-negative value", state.currency));
        }

        let expected_rate = self.rate_for(state);
        if state.production_rate.to_bits() != expected_rate.to_bits() {
            violations.push(format!(
                "production rate {} is stale (expected {})",
                state.production_rate, expected_rate
            ));
        }

        let ids: Vec<UpgradeId> = state.upgrades.iter().map(|u| u.id).collect();
        let expected_ids: Vec<UpgradeId> = self.catalog.ids().collect();
        if ids != expected_ids {
            violations.push(format!(
                "upgrade ids {ids:?} do not match catalog {expected_ids:?}"
            ));
        }

        if state.stats.total_earnings < state.stats.manual_earnings {
            violations.push(format!(
                "total earnings {} below manual earnings {}",
                state.stats.total_earnings, state.stats.manual_earnings
            ));
        }

        if state.stats.highest_currency_ever_held < state.currency {
            violations.push(format!(
                "highest currency {} below current {}",
                state.stats.highest_currency_ever_held, state.currency
            ));
        }

        violations
    }

    #[allow(clippy::unused_self)]
    fn validated(&self, state: GameState) -> GameState {
        #[cfg(feature = "debug-validation")]
        {
            let violations = self.check_invariants(&state);
            if !violations.is_empty() {
                tracing::error!(?violations, "State invariant violated");
            }
            debug_assert!(violations.is_empty(), "State invariant violated: {violations:?}");
        }
        state
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(UpgradeCatalog::standard())
    }
}

/// Add earned currency and refresh the earnings statistics.
fn credit(state: &mut GameState, amount: f64) {
    state.currency = round_to_precision(state.currency + amount);
    state.stats.total_earnings = round_to_precision(state.stats.total_earnings + amount);
    state.stats.highest_currency_ever_held =
        state.stats.highest_currency_ever_held.max(state.currency);
}
