//! Run metrics collection for balance analysis.
//!
//! A [`MetricsCollector`] watches one autoplay run tick by tick and produces
//! [`RunMetrics`]; [`BatchSummary`] aggregates many runs by strategy.

use std::collections::BTreeMap;

use idle_core::data::UpgradeCatalog;
use idle_core::state::GameState;
use serde::{Deserialize, Serialize};

use crate::strategies::TickActions;

/// Total-earnings milestones recorded with the time they were reached.
pub const EARNINGS_MILESTONES: [(&str, f64); 4] = [
    ("1K", 1.0e3),
    ("1M", 1.0e6),
    ("1B", 1.0e9),
    ("1T", 1.0e12),
];

/// Complete metrics for a single autoplay run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Unique run identifier.
    pub run_id: String,
    /// Strategy name.
    pub strategy: String,
    /// Simulated play time in milliseconds.
    pub simulated_ms: u64,
    /// Balance at the end.
    pub final_currency: f64,
    /// Production rate at the end.
    pub final_production_rate: f64,
    /// Manual actions performed.
    pub total_clicks: u64,
    /// Currency from manual actions.
    pub manual_earnings: f64,
    /// Currency from all sources.
    pub total_earnings: f64,
    /// Highest balance held.
    pub highest_currency: f64,
    /// Prestige points at the end.
    pub prestige_points: u64,
    /// Prestiges performed.
    pub prestige_count: u64,
    /// Accepted purchases.
    pub purchases: u32,
    /// Levels bought across all purchases.
    pub levels_bought: u32,
    /// Final level per upgrade name.
    pub final_levels: BTreeMap<String, u32>,
    /// Milliseconds until the first purchase.
    pub first_purchase_ms: Option<u64>,
    /// Milliseconds until the first prestige.
    pub first_prestige_ms: Option<u64>,
    /// Milliseconds until each total-earnings milestone.
    pub milestones: BTreeMap<String, u64>,
    /// Final state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl RunMetrics {
    /// Create an empty record for a run.
    #[must_use]
    pub fn new(run_id: impl Into<String>, strategy: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            strategy: strategy.into(),
            ..Default::default()
        }
    }

    /// Share of total earnings that came from clicking.
    #[must_use]
    pub fn manual_share(&self) -> f64 {
        if self.total_earnings > 0.0 {
            self.manual_earnings / self.total_earnings
        } else {
            0.0
        }
    }
}

/// Metrics collector that tracks one run.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RunMetrics,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(run_id: &str, strategy: &str) -> Self {
        Self {
            metrics: RunMetrics::new(run_id, strategy),
        }
    }

    /// Record what happened in the tick ending at `elapsed_ms`.
    pub fn record_tick(&mut self, elapsed_ms: u64, actions: &TickActions, state: &GameState) {
        let m = &mut self.metrics;
        if actions.purchases > 0 {
            m.purchases += actions.purchases;
            m.levels_bought += actions.levels_bought;
            m.first_purchase_ms.get_or_insert(elapsed_ms);
        }
        if actions.prestiged {
            m.first_prestige_ms.get_or_insert(elapsed_ms);
        }

        let earned = state.stats().total_earnings;
        for (label, threshold) in EARNINGS_MILESTONES {
            if earned >= threshold {
                m.milestones.entry(label.to_string()).or_insert(elapsed_ms);
            }
        }
    }

    /// Close the run against its final state.
    #[must_use]
    pub fn finalize(
        mut self,
        elapsed_ms: u64,
        state: &GameState,
        catalog: &UpgradeCatalog,
    ) -> RunMetrics {
        let m = &mut self.metrics;
        m.simulated_ms = elapsed_ms;
        m.final_currency = state.currency();
        m.final_production_rate = state.production_rate();
        m.total_clicks = state.stats().total_clicks;
        m.manual_earnings = state.stats().manual_earnings;
        m.total_earnings = state.stats().total_earnings;
        m.highest_currency = state.stats().highest_currency_ever_held;
        m.prestige_points = state.prestige_points();
        m.prestige_count = state.prestige_count();
        m.final_state_hash = state.state_hash();
        m.final_levels = state
            .upgrades()
            .iter()
            .map(|u| {
                let name = catalog
                    .get(u.id)
                    .map_or_else(|| u.id.to_string(), |def| def.name.clone());
                (name, u.level)
            })
            .collect();
        self.metrics
    }

    /// Metrics so far.
    #[must_use]
    pub fn current(&self) -> &RunMetrics {
        &self.metrics
    }
}

/// Aggregates for one strategy across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    /// Runs of this strategy.
    pub runs: u32,
    /// Average total earnings.
    pub avg_total_earnings: f64,
    /// Average final production rate.
    pub avg_final_production_rate: f64,
    /// Average share of earnings from clicking.
    pub avg_manual_share: f64,
    /// Average prestige points at the end.
    pub avg_prestige_points: f64,
    /// Average milliseconds to the first million earned, over runs that got there.
    pub avg_ms_to_million: Option<f64>,
}

/// Summary statistics across a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total runs.
    pub total_runs: u32,
    /// Per-strategy aggregates.
    pub by_strategy: BTreeMap<String, StrategySummary>,
    /// Strategy with the highest average total earnings.
    pub best_strategy: Option<String>,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let mut grouped: BTreeMap<&str, Vec<&RunMetrics>> = BTreeMap::new();
        for run in runs {
            grouped.entry(run.strategy.as_str()).or_default().push(run);
        }

        let by_strategy: BTreeMap<String, StrategySummary> = grouped
            .into_iter()
            .map(|(name, runs)| (name.to_string(), summarize(&runs)))
            .collect();

        let best_strategy = by_strategy
            .iter()
            .max_by(|a, b| a.1.avg_total_earnings.total_cmp(&b.1.avg_total_earnings))
            .map(|(name, _)| name.clone());

        Self {
            total_runs: runs.len() as u32,
            by_strategy,
            best_strategy,
        }
    }
}

fn summarize(runs: &[&RunMetrics]) -> StrategySummary {
    let count = runs.len().max(1) as f64;
    let average = |f: fn(&RunMetrics) -> f64| runs.iter().map(|r| f(r)).sum::<f64>() / count;

    let million: Vec<u64> = runs
        .iter()
        .filter_map(|r| r.milestones.get("1M").copied())
        .collect();

    StrategySummary {
        runs: runs.len() as u32,
        avg_total_earnings: average(|r| r.total_earnings),
        avg_final_production_rate: average(|r| r.final_production_rate),
        avg_manual_share: average(RunMetrics::manual_share),
        avg_prestige_points: average(|r| r.prestige_points as f64),
        avg_ms_to_million: (!million.is_empty())
            .then(|| million.iter().sum::<u64>() as f64 / million.len() as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idle_core::engine::Engine;
    use idle_core::state::Timestamp;

    fn run(strategy: &str, total: f64, manual: f64) -> RunMetrics {
        RunMetrics {
            total_earnings: total,
            manual_earnings: manual,
            ..RunMetrics::new(format!("{strategy}_0"), strategy)
        }
    }

    #[test]
    fn test_manual_share() {
        assert_eq!(run("a", 200.0, 50.0).manual_share(), 0.25);
        assert_eq!(run("a", 0.0, 0.0).manual_share(), 0.0);
    }

    #[test]
    fn test_batch_summary_groups_by_strategy() {
        let mut fast = run("Fast", 3_000.0, 0.0);
        fast.milestones.insert("1M".to_string(), 4_000);
        let runs = [fast, run("Fast", 1_000.0, 0.0), run("Slow", 500.0, 500.0)];

        let summary = BatchSummary::from_runs(&runs);
        assert_eq!(summary.total_runs, 3);
        assert_eq!(summary.best_strategy.as_deref(), Some("Fast"));

        let fast = &summary.by_strategy["Fast"];
        assert_eq!(fast.runs, 2);
        assert!((fast.avg_total_earnings - 2_000.0).abs() < 1e-9);
        assert_eq!(fast.avg_ms_to_million, Some(4_000.0));

        let slow = &summary.by_strategy["Slow"];
        assert_eq!(slow.avg_manual_share, 1.0);
        assert_eq!(slow.avg_ms_to_million, None);
    }

    #[test]
    fn test_empty_batch() {
        let summary = BatchSummary::from_runs(&[]);
        assert_eq!(summary.total_runs, 0);
        assert!(summary.best_strategy.is_none());
    }

    #[test]
    fn test_collector_records_first_events_once() {
        let engine = Engine::default();
        let state = engine.new_game(Timestamp::ZERO);
        let mut collector = MetricsCollector::new("r", "s");
        let bought = TickActions {
            purchases: 1,
            levels_bought: 3,
            ..TickActions::default()
        };
        collector.record_tick(100, &bought, &state);
        collector.record_tick(200, &bought, &state);
        assert_eq!(collector.current().first_purchase_ms, Some(100));
        assert_eq!(collector.current().levels_bought, 6);

        let metrics = collector.finalize(200, &state, engine.catalog());
        assert_eq!(metrics.final_levels.len(), 4);
        assert_eq!(metrics.final_levels["Farm"], 0);
        assert_eq!(metrics.final_state_hash, state.state_hash());
    }
}
