//! Read-only projections of a state for display.
//!
//! Everything here is derived on demand from a [`GameState`] through the
//! economy model and never stored back into it.

use serde::Serialize;

use crate::data::{UpgradeId, UpgradeKind};
use crate::economy::{
    bulk_purchase_cost, level_production_gain, manual_action_value, max_affordable_quantity,
    prestige_gain, prestige_manual_multiplier, prestige_production_multiplier, purchase_cost,
};
use crate::engine::Engine;
use crate::math::{round_to, spendable};
use crate::state::{GameState, HistorySample, Statistics, Timestamp};

const NUMBER_SUFFIXES: [&str; 6] = ["", "K", "M", "B", "T", "Q"];

/// One upgrade as a shop would list it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpgradeView {
    /// Upgrade id.
    pub id: UpgradeId,
    /// Display name.
    pub name: String,
    /// Production or manual.
    pub kind: UpgradeKind,
    /// Levels owned.
    pub level: u32,
    /// Cost of the next level.
    pub next_cost: f64,
    /// Levels a `Max` purchase would buy right now.
    pub max_affordable: u32,
    /// What that `Max` purchase would cost.
    pub max_affordable_cost: f64,
    /// Whether at least one level is affordable.
    pub affordable: bool,
    /// Production rate added by one more level (zero for manual).
    pub production_gain: f64,
}

/// Share of all purchased levels held by one upgrade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSlice {
    /// Upgrade id.
    pub id: UpgradeId,
    /// Display name.
    pub name: String,
    /// Levels owned.
    pub level: u32,
    /// Percentage of total levels, one decimal place.
    pub percent: f64,
}

/// Everything a display needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReport {
    /// Balance.
    pub currency: f64,
    /// Currency per second.
    pub production_rate: f64,
    /// Instant accrual was last applied.
    pub last_update: Timestamp,
    /// Permanent prestige points.
    pub prestige_points: u64,
    /// Prestiges performed.
    pub prestige_count: u64,
    /// Points a prestige right now would award.
    pub prestige_gain_preview: u64,
    /// Production multiplier from prestige points.
    pub production_multiplier: f64,
    /// Manual-action multiplier from prestige points.
    pub manual_multiplier: f64,
    /// Currency one manual action grants.
    pub click_value: f64,
    /// Shop rows in catalog order.
    pub upgrades: Vec<UpgradeView>,
    /// Cumulative statistics.
    pub stats: Statistics,
    /// Milliseconds since the save was created.
    pub time_played_ms: u64,
    /// Earnings history, oldest first.
    pub history: Vec<HistorySample>,
    /// Level shares, zero-level upgrades omitted.
    pub upgrade_distribution: Vec<DistributionSlice>,
}

impl StateReport {
    /// Build the report for `state` as seen at `now`.
    #[must_use]
    pub fn new(engine: &Engine, state: &GameState, now: Timestamp) -> Self {
        let points = state.prestige_points();
        Self {
            currency: state.currency(),
            production_rate: state.production_rate(),
            last_update: state.last_update(),
            prestige_points: points,
            prestige_count: state.prestige_count(),
            prestige_gain_preview: prestige_gain(state.currency()),
            production_multiplier: prestige_production_multiplier(points),
            manual_multiplier: prestige_manual_multiplier(points),
            click_value: manual_action_value(state.upgrades(), engine.catalog(), points),
            upgrades: upgrade_views(engine, state),
            stats: *state.stats(),
            time_played_ms: now.millis_since(state.stats().session_start),
            history: state.history().iter().copied().collect(),
            upgrade_distribution: upgrade_distribution(engine, state),
        }
    }

    /// Human-readable summary, one line per figure.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Currency: {}", format_number(self.currency)),
            format!("Per second: {}", format_number(self.production_rate)),
            format!("Per click: {}", format_number(self.click_value)),
            format!(
                "Prestige: {} points ({} resets), next reset +{}",
                self.prestige_points, self.prestige_count, self.prestige_gain_preview
            ),
            format!("Time played: {}", format_duration(self.time_played_ms)),
            format!("Total clicks: {}", self.stats.total_clicks),
            format!("Manual earnings: {}", format_number(self.stats.manual_earnings)),
            format!("Total earnings: {}", format_number(self.stats.total_earnings)),
            format!(
                "Highest held: {}",
                format_number(self.stats.highest_currency_ever_held)
            ),
        ];
        for view in &self.upgrades {
            lines.push(format!(
                "  [{}] {:<10} lvl {:>4}  next {}{}",
                view.id,
                view.name,
                view.level,
                format_number(view.next_cost),
                if view.affordable { "  *" } else { "" }
            ));
        }
        lines
    }
}

fn upgrade_views(engine: &Engine, state: &GameState) -> Vec<UpgradeView> {
    let available = spendable(state.currency());
    engine
        .catalog()
        .iter()
        .map(|definition| {
            let level = state.level(definition.id).unwrap_or(0);
            let next_cost = purchase_cost(definition, level);
            let max_affordable = max_affordable_quantity(definition, level, available);
            UpgradeView {
                id: definition.id,
                name: definition.name.clone(),
                kind: definition.kind,
                level,
                next_cost,
                max_affordable,
                max_affordable_cost: bulk_purchase_cost(definition, level, max_affordable),
                affordable: max_affordable > 0,
                production_gain: level_production_gain(definition, state.prestige_points()),
            }
        })
        .collect()
}

/// Share of purchased levels per upgrade, skipping upgrades at level 0.
#[must_use]
pub fn upgrade_distribution(engine: &Engine, state: &GameState) -> Vec<DistributionSlice> {
    let total: u64 = state.upgrades().iter().map(|u| u64::from(u.level)).sum();
    if total == 0 {
        return Vec::new();
    }
    state
        .upgrades()
        .iter()
        .filter(|u| u.level > 0)
        .filter_map(|u| {
            let definition = engine.catalog().get(u.id)?;
            Some(DistributionSlice {
                id: u.id,
                name: definition.name.clone(),
                level: u.level,
                percent: round_to(f64::from(u.level) / total as f64 * 100.0, 1),
            })
        })
        .collect()
}

/// Two decimals plus a thousands suffix: `1.50 K`, `12.00`.
///
/// Non-finite input renders as `0.00`.
#[must_use]
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }
    let mut scaled = value;
    let mut suffix = 0;
    while scaled >= 1000.0 && suffix < NUMBER_SUFFIXES.len() - 1 {
        scaled /= 1000.0;
        suffix += 1;
    }
    match NUMBER_SUFFIXES[suffix] {
        "" => format!("{scaled:.2}"),
        s => format!("{scaled:.2} {s}"),
    }
}

/// Compact duration such as `1d 2h 3m 4s`.
///
/// Leading zero units are omitted; seconds are always shown.
#[must_use]
pub fn format_duration(millis: u64) -> String {
    let total_seconds = millis / 1000;
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::new();
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 || days > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 || hours > 0 || days > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}
