//! Scripted autoplay strategies for headless balance runs.
//!
//! A [`Strategy`] says how often to click, what to buy, and when to
//! prestige. [`Autoplayer`] applies one to a [`Session`] tick by tick.

use std::path::Path;

use idle_core::data::{UpgradeDefinition, UpgradeId, UpgradeKind};
use idle_core::economy::{
    level_production_gain, prestige_manual_multiplier, purchase_cost, PRESTIGE_THRESHOLD,
};
use idle_core::engine::PurchaseQuantity;
use idle_core::math::spendable;
use idle_core::persistence::SnapshotStore;
use idle_core::session::Session;
use idle_core::state::GameState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on purchases per tick, so a huge balance cannot stall a run.
const MAX_PURCHASES_PER_TICK: u32 = 32;

/// Error type for strategy operations.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// File not found.
    #[error("Strategy file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read strategy file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse strategy: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Parsed but unusable.
    #[error("Invalid strategy '{name}': {reason}")]
    Invalid {
        /// Strategy name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Which upgrade to buy next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchasePolicy {
    /// Whatever has the lowest next-level cost.
    Cheapest,
    /// Lowest cost per unit of added income, waiting for it if needed.
    BestPayback,
    /// Never buy.
    None,
}

/// How many levels each purchase asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkSize {
    /// Everything affordable.
    Max,
    /// A fixed number of levels.
    Count(u32),
}

impl From<BulkSize> for PurchaseQuantity {
    fn from(bulk: BulkSize) -> Self {
        match bulk {
            BulkSize::Max => PurchaseQuantity::Max,
            BulkSize::Count(n) => PurchaseQuantity::Count(n),
        }
    }
}

/// A complete autoplay configuration.
///
/// # Example RON
///
/// ```ron
/// Strategy(
///     name: "Payback",
///     description: "Buys the best income per cost",
///     clicks_per_second: 5.0,
///     purchase_policy: BestPayback,
///     bulk: Max,
///     prestige_at: None,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Strategy name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Manual actions per simulated second.
    pub clicks_per_second: f64,
    /// Purchase choice.
    pub purchase_policy: PurchasePolicy,
    /// Levels per purchase.
    pub bulk: BulkSize,
    /// Prestige once currency reaches this much.
    #[serde(default)]
    pub prestige_at: Option<f64>,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::payback()
    }
}

impl Strategy {
    /// Load a strategy from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StrategyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StrategyError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, StrategyError> {
        let strategy: Strategy = ron::from_str(ron)?;
        strategy.validate()?;
        Ok(strategy)
    }

    /// A built-in name, or else a RON file path.
    pub fn resolve(name_or_path: &str) -> Result<Self, StrategyError> {
        match Self::builtin(name_or_path) {
            Some(strategy) => Ok(strategy),
            None => Self::load(name_or_path),
        }
    }

    /// Look up a built-in strategy by name, ignoring case.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        Self::builtins()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Every built-in strategy.
    #[must_use]
    pub fn builtins() -> Vec<Self> {
        vec![Self::idler(), Self::clicker(), Self::payback(), Self::prestiger()]
    }

    /// Reject rates and targets the session cannot use.
    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |reason: &str| StrategyError::Invalid {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if !self.clicks_per_second.is_finite() || self.clicks_per_second < 0.0 {
            return Err(invalid("clicks_per_second must be finite and non-negative"));
        }
        if self.bulk == BulkSize::Count(0) {
            return Err(invalid("bulk count must be at least 1"));
        }
        if let Some(target) = self.prestige_at {
            if !target.is_finite() || target < PRESTIGE_THRESHOLD {
                return Err(invalid("prestige_at must be at least the prestige threshold"));
            }
        }
        Ok(())
    }

    /// Never clicks; buys the cheapest level one at a time.
    #[must_use]
    pub fn idler() -> Self {
        Self {
            name: "Idler".to_string(),
            description: "No clicking, buys the cheapest level whenever possible".to_string(),
            clicks_per_second: 0.0,
            purchase_policy: PurchasePolicy::Cheapest,
            bulk: BulkSize::Count(1),
            prestige_at: None,
        }
    }

    /// Clicks hard; buys the cheapest level one at a time.
    #[must_use]
    pub fn clicker() -> Self {
        Self {
            name: "Clicker".to_string(),
            description: "Ten clicks a second, cheapest level first".to_string(),
            clicks_per_second: 10.0,
            purchase_policy: PurchasePolicy::Cheapest,
            bulk: BulkSize::Count(1),
            prestige_at: None,
        }
    }

    /// Moderate clicking; saves for the best income per cost.
    #[must_use]
    pub fn payback() -> Self {
        Self {
            name: "Payback".to_string(),
            description: "Five clicks a second, buys the best income per cost".to_string(),
            clicks_per_second: 5.0,
            purchase_policy: PurchasePolicy::BestPayback,
            bulk: BulkSize::Max,
            prestige_at: None,
        }
    }

    /// Payback play that prestiges at twice the threshold.
    #[must_use]
    pub fn prestiger() -> Self {
        Self {
            name: "Prestiger".to_string(),
            description: "Payback play, prestiges at two million".to_string(),
            clicks_per_second: 5.0,
            purchase_policy: PurchasePolicy::BestPayback,
            bulk: BulkSize::Max,
            prestige_at: Some(2.0 * PRESTIGE_THRESHOLD),
        }
    }
}

/// What an autoplayer did during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickActions {
    /// Manual actions performed.
    pub clicks: u32,
    /// Accepted purchases.
    pub purchases: u32,
    /// Levels those purchases bought.
    pub levels_bought: u32,
    /// Whether a prestige happened.
    pub prestiged: bool,
}

/// Applies a strategy to a session.
#[derive(Debug, Clone)]
pub struct Autoplayer {
    strategy: Strategy,
    click_budget: f64,
}

impl Autoplayer {
    /// Create an autoplayer for a strategy.
    #[must_use]
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            click_budget: 0.0,
        }
    }

    /// Get the strategy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.strategy.name
    }

    /// Get the strategy.
    #[must_use]
    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Click, buy, and maybe prestige for `dt_seconds` of play.
    ///
    /// Fractional clicks carry over to the next tick.
    pub fn act<S: SnapshotStore>(
        &mut self,
        session: &mut Session<S>,
        dt_seconds: f64,
    ) -> TickActions {
        let mut actions = TickActions::default();

        self.click_budget += self.strategy.clicks_per_second * dt_seconds.max(0.0);
        while self.click_budget >= 1.0 {
            session.manual_action();
            self.click_budget -= 1.0;
            actions.clicks += 1;
        }

        if let Some(target) = self.strategy.prestige_at {
            if session.state().currency() >= target && session.prestige().is_ok() {
                actions.prestiged = true;
                return actions;
            }
        }

        let quantity = PurchaseQuantity::from(self.strategy.bulk);
        while actions.purchases < MAX_PURCHASES_PER_TICK {
            let Some(target) = self.next_purchase(session) else {
                break;
            };
            let before = session.state().level(target).unwrap_or(0);
            if session.purchase(target, quantity).is_err() {
                break;
            }
            let after = session.state().level(target).unwrap_or(0);
            actions.purchases += 1;
            actions.levels_bought += after.saturating_sub(before);
            tracing::trace!(strategy = %self.strategy.name, upgrade = %target, levels = after - before, "Autoplay purchase");
        }

        actions
    }

    /// Upgrade the policy wants next, if it is affordable now.
    fn next_purchase<S: SnapshotStore>(&self, session: &Session<S>) -> Option<UpgradeId> {
        let state = session.state();
        let catalog = session.engine().catalog();
        let available = spendable(state.currency());

        let priced = catalog
            .iter()
            .filter_map(|def| state.level(def.id).map(|level| (def, purchase_cost(def, level))));

        let choice = match self.strategy.purchase_policy {
            PurchasePolicy::None => None,
            PurchasePolicy::Cheapest => priced.min_by(|a, b| a.1.total_cmp(&b.1)),
            PurchasePolicy::BestPayback => priced
                .filter_map(|(def, cost)| {
                    let gain = self.income_per_level(def, state);
                    (gain > 0.0).then_some((def, cost, cost / gain))
                })
                .min_by(|a, b| a.2.total_cmp(&b.2))
                .map(|(def, cost, _)| (def, cost)),
        };

        choice
            .filter(|(_, cost)| *cost <= available)
            .map(|(def, _)| def.id)
    }

    /// Currency per second one more level adds under this strategy.
    fn income_per_level(&self, definition: &UpgradeDefinition, state: &GameState) -> f64 {
        match definition.kind {
            UpgradeKind::Production => {
                level_production_gain(definition, state.prestige_points())
            }
            UpgradeKind::Manual => {
                definition.effect
                    * prestige_manual_multiplier(state.prestige_points())
                    * self.strategy.clicks_per_second
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idle_core::engine::Engine;
    use idle_core::persistence::MemoryStore;
    use idle_core::state::Timestamp;

    fn session() -> Session<MemoryStore> {
        Session::start(Engine::default(), MemoryStore::new(), Timestamp::ZERO).0
    }

    #[test]
    fn test_builtins_are_valid_and_unique() {
        let builtins = Strategy::builtins();
        for strategy in &builtins {
            strategy.validate().unwrap();
        }
        let mut names: Vec<_> = builtins.iter().map(|s| s.name.to_lowercase()).collect();
        names.dedup();
        assert_eq!(names.len(), builtins.len());
    }

    #[test]
    fn test_builtin_lookup_ignores_case() {
        assert_eq!(Strategy::builtin("PAYBACK"), Some(Strategy::payback()));
        assert!(Strategy::builtin("rush").is_none());
    }

    #[test]
    fn test_parse_ron_strategy() {
        let ron = r#"Strategy(
            name: "Saver",
            clicks_per_second: 2.0,
            purchase_policy: Cheapest,
            bulk: Count(5),
        )"#;
        let strategy = Strategy::from_ron_str(ron).unwrap();
        assert_eq!(strategy.bulk, BulkSize::Count(5));
        assert_eq!(strategy.prestige_at, None);
        assert!(strategy.description.is_empty());
    }

    #[test]
    fn test_shipped_files_match_builtins() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/strategies");
        for builtin in Strategy::builtins() {
            let file = dir.join(format!("{}.ron", builtin.name.to_lowercase()));
            assert_eq!(Strategy::load(&file).unwrap(), builtin, "{}", file.display());
        }
        let saver = Strategy::load(dir.join("bulk_saver.ron")).unwrap();
        assert_eq!(saver.bulk, BulkSize::Count(10));
    }

    #[test]
    fn test_low_prestige_target_is_invalid() {
        let mut strategy = Strategy::prestiger();
        strategy.prestige_at = Some(10.0);
        assert!(matches!(strategy.validate(), Err(StrategyError::Invalid { .. })));
    }

    #[test]
    fn test_missing_file_is_reported() {
        assert!(matches!(
            Strategy::resolve("/nonexistent/strategy.ron"),
            Err(StrategyError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_clicks_carry_fractions() {
        let mut player = Autoplayer::new(Strategy {
            clicks_per_second: 2.5,
            purchase_policy: PurchasePolicy::None,
            ..Strategy::clicker()
        });
        let mut session = session();
        let total: u32 = (0..10).map(|_| player.act(&mut session, 0.1).clicks).sum();
        assert_eq!(total, 2);
        assert_eq!(session.state().stats().total_clicks, 2);
    }

    #[test]
    fn test_cheapest_buys_clicker_first() {
        let mut player = Autoplayer::new(Strategy::clicker());
        let mut session = session();
        let actions = player.act(&mut session, 1.0);
        assert_eq!(actions.clicks, 10);
        assert_eq!(actions.purchases, 1);
        assert_eq!(session.state().level(UpgradeId(1)), Some(1));
    }

    #[test]
    fn test_idler_never_clicks() {
        let mut player = Autoplayer::new(Strategy::idler());
        let mut session = session();
        let actions = player.act(&mut session, 60.0);
        assert_eq!(actions.clicks, 0);
        assert_eq!(actions.purchases, 0);
    }
}
