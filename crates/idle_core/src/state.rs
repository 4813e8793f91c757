//! Game state: the root aggregate owned by the state machine.
//!
//! Fields are crate-private. Outside `idle_core` the state is read through
//! accessors and changed only by [`Engine`](crate::engine::Engine)
//! transitions, which keeps the derived production rate and the
//! one-entry-per-upgrade rule intact.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::data::{UpgradeCatalog, UpgradeId};

/// Maximum number of history samples kept; the oldest is evicted first.
pub const MAX_HISTORY_SAMPLES: usize = 60;

/// Wall-clock instant in milliseconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The epoch.
    pub const ZERO: Self = Self(0);

    /// Create a timestamp from milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// This instant moved forward by a (non-negative) number of seconds.
    #[must_use]
    pub fn advanced_by_secs(self, seconds: f64) -> Self {
        let millis = (seconds * 1000.0).round();
        if millis.is_finite() && millis > 0.0 {
            Self(self.0.saturating_add(millis as u64))
        } else {
            self
        }
    }

    /// Seconds elapsed from `earlier` to `self`; zero if `earlier` is later.
    #[must_use]
    pub fn seconds_since(self, earlier: Self) -> f64 {
        self.0.saturating_sub(earlier.0) as f64 / 1000.0
    }

    /// Milliseconds elapsed from `earlier` to `self`; zero if `earlier` is later.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Current level of one upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpgradeState {
    /// Upgrade this entry belongs to.
    pub id: UpgradeId,
    /// Purchased levels.
    pub level: u32,
}

/// One point on the earnings history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySample {
    /// When the sample was taken.
    pub timestamp: Timestamp,
    /// Lifetime earnings at that instant.
    pub total_earnings: f64,
}

/// Bounded earnings history, oldest sample first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct History {
    samples: VecDeque<HistorySample>,
}

impl History {
    /// Empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from samples, keeping only the newest [`MAX_HISTORY_SAMPLES`].
    #[must_use]
    pub fn from_samples(samples: impl IntoIterator<Item = HistorySample>) -> Self {
        let mut history = Self::new();
        for sample in samples {
            history.push(sample);
        }
        history
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: HistorySample) {
        if self.samples.len() == MAX_HISTORY_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Cumulative statistics. Prestige keeps them; only a full reset clears them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Statistics {
    /// Manual actions performed.
    pub total_clicks: u64,
    /// Currency earned through manual actions.
    pub manual_earnings: f64,
    /// Currency earned from every source.
    pub total_earnings: f64,
    /// Largest balance observed after any accrual.
    pub highest_currency_ever_held: f64,
    /// When this save was first created.
    pub session_start: Timestamp,
}

impl Statistics {
    /// Zeroed statistics for a save starting at `now`.
    #[must_use]
    pub const fn new(now: Timestamp) -> Self {
        Self {
            total_clicks: 0,
            manual_earnings: 0.0,
            total_earnings: 0.0,
            highest_currency_ever_held: 0.0,
            session_start: now,
        }
    }
}

/// Full state of one save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameState {
    pub(crate) currency: f64,
    pub(crate) production_rate: f64,
    pub(crate) last_update: Timestamp,
    pub(crate) upgrades: Vec<UpgradeState>,
    pub(crate) prestige_points: u64,
    pub(crate) prestige_count: u64,
    pub(crate) stats: Statistics,
    pub(crate) history: History,
}

impl GameState {
    /// Default state for `catalog`: no currency, every level at zero.
    ///
    /// `production_rate` must be filled in by the caller from the economy
    /// model; [`Engine::new_game`](crate::engine::Engine::new_game) does so.
    pub(crate) fn fresh(catalog: &UpgradeCatalog, now: Timestamp, production_rate: f64) -> Self {
        Self {
            currency: 0.0,
            production_rate,
            last_update: now,
            upgrades: catalog
                .ids()
                .map(|id| UpgradeState { id, level: 0 })
                .collect(),
            prestige_points: 0,
            prestige_count: 0,
            stats: Statistics::new(now),
            history: History::new(),
        }
    }

    /// Current balance.
    #[must_use]
    pub fn currency(&self) -> f64 {
        self.currency
    }

    /// Currency per second from automatic sources.
    #[must_use]
    pub fn production_rate(&self) -> f64 {
        self.production_rate
    }

    /// Instant accrual was last applied.
    #[must_use]
    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    /// Upgrade levels in catalog order.
    #[must_use]
    pub fn upgrades(&self) -> &[UpgradeState] {
        &self.upgrades
    }

    /// Level of `id`, or `None` if the id is not part of this state.
    #[must_use]
    pub fn level(&self, id: UpgradeId) -> Option<u32> {
        self.upgrades.iter().find(|u| u.id == id).map(|u| u.level)
    }

    /// Permanent prestige points.
    #[must_use]
    pub fn prestige_points(&self) -> u64 {
        self.prestige_points
    }

    /// Number of prestiges performed.
    #[must_use]
    pub fn prestige_count(&self) -> u64 {
        self.prestige_count
    }

    /// Cumulative statistics.
    #[must_use]
    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Earnings history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn upgrade_mut(&mut self, id: UpgradeId) -> Option<&mut UpgradeState> {
        self.upgrades.iter_mut().find(|u| u.id == id)
    }

    /// Deterministic hash of the full state.
    ///
    /// Floats are hashed by bit pattern, so two states hash equal only if
    /// every field is bit-for-bit identical.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.currency.to_bits().hash(&mut hasher);
        self.production_rate.to_bits().hash(&mut hasher);
        self.last_update.hash(&mut hasher);

        self.upgrades.len().hash(&mut hasher);
        for upgrade in &self.upgrades {
            upgrade.hash(&mut hasher);
        }

        self.prestige_points.hash(&mut hasher);
        self.prestige_count.hash(&mut hasher);

        self.stats.total_clicks.hash(&mut hasher);
        self.stats.manual_earnings.to_bits().hash(&mut hasher);
        self.stats.total_earnings.to_bits().hash(&mut hasher);
        self.stats.highest_currency_ever_held.to_bits().hash(&mut hasher);
        self.stats.session_start.hash(&mut hasher);

        self.history.len().hash(&mut hasher);
        for sample in self.history.iter() {
            sample.timestamp.hash(&mut hasher);
            sample.total_earnings.to_bits().hash(&mut hasher);
        }

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: u64) -> HistorySample {
        HistorySample {
            timestamp: Timestamp(t),
            total_earnings: t as f64,
        }
    }

    #[test]
    fn test_history_evicts_oldest_first() {
        let mut history = History::new();
        for t in 0..(MAX_HISTORY_SAMPLES as u64 + 5) {
            history.push(sample(t));
        }
        assert_eq!(history.len(), MAX_HISTORY_SAMPLES);
        assert_eq!(history.iter().next().map(|s| s.timestamp), Some(Timestamp(5)));
        assert_eq!(
            history.latest().map(|s| s.timestamp),
            Some(Timestamp(MAX_HISTORY_SAMPLES as u64 + 4))
        );
    }

    #[test]
    fn test_history_from_samples_trims_to_capacity() {
        let history = History::from_samples((0..100).map(sample));
        assert_eq!(history.len(), MAX_HISTORY_SAMPLES);
        assert_eq!(history.latest().map(|s| s.timestamp), Some(Timestamp(99)));
    }

    #[test]
    fn test_timestamp_arithmetic() {
        let t = Timestamp::from_millis(1_000);
        assert_eq!(t.advanced_by_secs(2.5), Timestamp(3_500));
        assert_eq!(t.advanced_by_secs(-1.0), t);
        assert_eq!(t.advanced_by_secs(f64::NAN), t);
        assert_eq!(Timestamp(3_500).seconds_since(t), 2.5);
        assert_eq!(t.seconds_since(Timestamp(3_500)), 0.0);
        assert_eq!(Timestamp(3_500).millis_since(t), 2_500);
    }

    #[test]
    fn test_fresh_state_has_one_entry_per_upgrade() {
        let catalog = UpgradeCatalog::standard();
        let state = GameState::fresh(&catalog, Timestamp(10), 0.1);
        assert_eq!(state.upgrades().len(), catalog.len());
        assert!(state.upgrades().iter().all(|u| u.level == 0));
        assert_eq!(state.stats().session_start, Timestamp(10));
        assert_eq!(state.level(UpgradeId(4)), Some(0));
        assert_eq!(state.level(UpgradeId(40)), None);
    }

    #[test]
    fn test_state_hash_tracks_every_field() {
        let catalog = UpgradeCatalog::standard();
        let a = GameState::fresh(&catalog, Timestamp(10), 0.1);
        let mut b = a.clone();
        assert_eq!(a.state_hash(), b.state_hash());

        b.stats.total_clicks = 1;
        assert_ne!(a.state_hash(), b.state_hash());

        let mut c = a.clone();
        c.history.push(sample(1));
        assert_ne!(a.state_hash(), c.state_hash());
    }
}
