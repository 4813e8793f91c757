//! Save snapshots and the store they are written to.
//!
//! ## Versioning
//!
//! - [`SNAPSHOT_VERSION`]: the format written today. Bump it when fields
//!   are added.
//! - [`MIN_COMPATIBLE_VERSION`]: the oldest format still loadable. Bump it
//!   only when a field changes meaning or disappears.
//!
//! Older snapshots at or above the minimum load with their missing fields
//! filled from defaults. A document without a `version` is version 1.
//!
//! The JSON form uses camelCase keys and is the save contract; the
//! bincode form carries the same fields for compact local files. Version-1
//! browser saves named the first three fields `coins`, `coinsPerSecond`
//! and `lastUpdate`; those names are still accepted on load.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::data::UpgradeId;
use crate::engine::Engine;
use crate::error::{GameError, Result};
use crate::state::{
    GameState, History, HistorySample, Statistics, Timestamp, UpgradeState, MAX_HISTORY_SAMPLES,
};

/// Snapshot format written by this build.
pub const SNAPSHOT_VERSION: u32 = 2;

/// Oldest snapshot format this build can load.
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

const fn legacy_version() -> u32 {
    1
}

/// Serialized form of a [`GameState`].
///
/// Optional fields are absent from version-1 saves; see
/// [`GameSnapshot::restore`] for how each is filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameSnapshot {
    /// Format version.
    #[serde(default = "legacy_version")]
    pub version: u32,
    /// Balance.
    #[serde(alias = "coins")]
    pub currency: f64,
    /// Rate at save time. Informational; always recomputed on restore.
    #[serde(alias = "coinsPerSecond")]
    pub production_rate: Option<f64>,
    /// Instant accrual was last applied.
    #[serde(alias = "lastUpdate")]
    pub last_update_timestamp: Option<Timestamp>,
    /// Upgrade levels.
    pub upgrades: Vec<UpgradeState>,
    /// Permanent prestige points.
    pub prestige_points: u64,
    /// Earnings history, oldest first.
    pub history: Vec<HistorySample>,
    /// Manual actions performed.
    pub total_clicks: u64,
    /// Currency earned through manual actions.
    pub manual_earnings: f64,
    /// Currency earned from every source.
    pub total_earnings: Option<f64>,
    /// When the save was first created.
    #[serde(alias = "startTime")]
    pub session_start_timestamp: Option<Timestamp>,
    /// Prestiges performed.
    pub prestige_count: u64,
    /// Largest balance observed.
    #[serde(alias = "highestCoins")]
    pub highest_currency_ever_held: Option<f64>,
}

impl GameSnapshot {
    /// Capture every persisted field of `state`.
    #[must_use]
    pub fn capture(state: &GameState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            currency: state.currency,
            production_rate: Some(state.production_rate),
            last_update_timestamp: Some(state.last_update),
            upgrades: state.upgrades.clone(),
            prestige_points: state.prestige_points,
            history: state.history.iter().copied().collect(),
            total_clicks: state.stats.total_clicks,
            manual_earnings: state.stats.manual_earnings,
            total_earnings: Some(state.stats.total_earnings),
            session_start_timestamp: Some(state.stats.session_start),
            prestige_count: state.prestige_count,
            highest_currency_ever_held: Some(state.stats.highest_currency_ever_held),
        }
    }

    /// Rebuild a state from this snapshot, merged against the engine's
    /// catalog.
    ///
    /// - Catalog ids missing from the snapshot start at level 0.
    /// - Snapshot ids the catalog no longer has are dropped.
    /// - The production rate is recomputed.
    /// - History beyond [`MAX_HISTORY_SAMPLES`] keeps the newest samples.
    ///
    /// # Errors
    ///
    /// [`GameError::CorruptPersistedState`] if the version is too old, a
    /// numeric field is negative or non-finite, or an upgrade id repeats.
    pub fn restore(&self, engine: &Engine, now: Timestamp) -> Result<GameState> {
        self.validate()?;

        let mut saved_levels = BTreeMap::new();
        for upgrade in &self.upgrades {
            if engine.catalog().get(upgrade.id).is_some() {
                saved_levels.insert(upgrade.id, upgrade.level);
            } else {
                tracing::warn!(upgrade = %upgrade.id, level = upgrade.level, "Dropping upgrade missing from catalog");
            }
        }
        let upgrades = engine
            .catalog()
            .ids()
            .map(|id| UpgradeState {
                id,
                level: saved_levels.get(&id).copied().unwrap_or(0),
            })
            .collect();

        if self.history.len() > MAX_HISTORY_SAMPLES {
            tracing::warn!(
                samples = self.history.len(),
                kept = MAX_HISTORY_SAMPLES,
                "Trimming oversized history"
            );
        }

        let last_update = self.last_update_timestamp.unwrap_or(now);
        let total_earnings = self
            .total_earnings
            .unwrap_or(self.currency)
            .max(self.manual_earnings);
        let highest = self
            .highest_currency_ever_held
            .unwrap_or(self.currency)
            .max(self.currency);

        let mut state = GameState {
            currency: self.currency,
            production_rate: 0.0,
            last_update,
            upgrades,
            prestige_points: self.prestige_points,
            prestige_count: self.prestige_count,
            stats: Statistics {
                total_clicks: self.total_clicks,
                manual_earnings: self.manual_earnings,
                total_earnings,
                highest_currency_ever_held: highest,
                session_start: self.session_start_timestamp.unwrap_or(last_update),
            },
            history: History::from_samples(self.history.iter().copied()),
        };
        state.production_rate = engine.rate_for(&state);

        if let Some(saved) = self.production_rate {
            if saved.to_bits() != state.production_rate.to_bits() {
                tracing::debug!(
                    saved,
                    recomputed = state.production_rate,
                    "Saved production rate replaced"
                );
            }
        }

        tracing::debug!(
            version = self.version,
            currency = state.currency,
            prestige_points = state.prestige_points,
            "Restored snapshot"
        );
        Ok(state)
    }

    fn validate(&self) -> Result<()> {
        if self.version < MIN_COMPATIBLE_VERSION {
            return Err(GameError::CorruptPersistedState(format!(
                "snapshot version {} is older than minimum {MIN_COMPATIBLE_VERSION}",
                self.version
            )));
        }
        if self.version > SNAPSHOT_VERSION {
            tracing::warn!(
                version = self.version,
                supported = SNAPSHOT_VERSION,
                "Snapshot is newer than this build; unknown fields are ignored"
            );
        }

        let amounts = [
            ("currency", Some(self.currency)),
            ("manualEarnings", Some(self.manual_earnings)),
            ("totalEarnings", self.total_earnings),
            ("highestCurrencyEverHeld", self.highest_currency_ever_held),
        ];
        for (field, value) in amounts {
            if let Some(value) = value {
                check_amount(field, value)?;
            }
        }
        for sample in &self.history {
            check_amount("history.totalEarnings", sample.total_earnings)?;
        }

        let mut seen = HashSet::new();
        for upgrade in &self.upgrades {
            if !seen.insert(upgrade.id) {
                return Err(GameError::CorruptPersistedState(format!(
                    "duplicate upgrade id {}",
                    upgrade.id
                )));
            }
        }
        Ok(())
    }

    /// Encode as the JSON save document.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Decode a JSON save document.
    ///
    /// # Errors
    ///
    /// Unparseable text is [`GameError::CorruptPersistedState`].
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| GameError::CorruptPersistedState(format!("invalid JSON snapshot: {e}")))
    }

    /// Encode with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Decode bincode bytes.
    ///
    /// # Errors
    ///
    /// Undecodable bytes are [`GameError::CorruptPersistedState`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            GameError::CorruptPersistedState(format!("invalid binary snapshot: {e}"))
        })
    }

    /// Level recorded for `id`, if any.
    #[must_use]
    pub fn level(&self, id: UpgradeId) -> Option<u32> {
        self.upgrades.iter().find(|u| u.id == id).map(|u| u.level)
    }
}

impl Default for GameSnapshot {
    /// An empty current-version snapshot; every optional field absent.
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            currency: 0.0,
            production_rate: None,
            last_update_timestamp: None,
            upgrades: Vec::new(),
            prestige_points: 0,
            history: Vec::new(),
            total_clicks: 0,
            manual_earnings: 0.0,
            total_earnings: None,
            session_start_timestamp: None,
            prestige_count: 0,
            highest_currency_ever_held: None,
        }
    }
}

impl From<&GameState> for GameSnapshot {
    fn from(state: &GameState) -> Self {
        Self::capture(state)
    }
}

fn check_amount(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(GameError::CorruptPersistedState(format!(
            "{field} is {value}, expected a finite non-negative amount"
        )))
    }
}

/// Where snapshots live between runs.
///
/// A store owns its encoding. `load` reports undecodable content as
/// [`GameError::CorruptPersistedState`] so the caller can discard it.
pub trait SnapshotStore {
    /// Read the stored snapshot, if there is one.
    fn load(&self) -> Result<Option<GameSnapshot>>;

    /// Replace the stored snapshot.
    fn save(&mut self, snapshot: &GameSnapshot) -> Result<()>;

    /// Remove the stored snapshot.
    fn clear(&mut self) -> Result<()>;
}

/// In-memory store holding the JSON document.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
    saves: usize,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with raw JSON text, as a saved document would be.
    #[must_use]
    pub fn with_document(text: impl Into<String>) -> Self {
        Self {
            document: Some(text.into()),
            saves: 0,
        }
    }

    /// The raw stored document.
    #[must_use]
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// How many times `save` succeeded.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<GameSnapshot>> {
        self.document
            .as_deref()
            .map(GameSnapshot::from_json)
            .transpose()
    }

    fn save(&mut self, snapshot: &GameSnapshot) -> Result<()> {
        self.document = Some(snapshot.to_json()?);
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.document = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{UpgradeCatalog, UpgradeDefinition, UpgradeKind};
    use crate::engine::PurchaseQuantity;

    fn played_state(engine: &Engine) -> GameState {
        let mut state = engine.new_game(Timestamp(5_000));
        for _ in 0..150 {
            state = engine.manual_action(&state);
        }
        let state = engine
            .purchase(&state, UpgradeId(2), PurchaseQuantity::Count(1))
            .unwrap();
        let state = engine.advance(&state, 12.5);
        engine.sample_history(&state)
    }

    #[test]
    fn test_json_round_trip_restores_identical_state() {
        let engine = Engine::default();
        let state = played_state(&engine);
        let json = GameSnapshot::capture(&state).to_json().unwrap();
        let restored = GameSnapshot::from_json(&json)
            .unwrap()
            .restore(&engine, Timestamp(999_999))
            .unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_bincode_round_trip_restores_identical_state() {
        let engine = Engine::default();
        let state = played_state(&engine);
        let bytes = GameSnapshot::capture(&state).to_bytes().unwrap();
        let restored = GameSnapshot::from_bytes(&bytes)
            .unwrap()
            .restore(&engine, Timestamp(0))
            .unwrap();
        assert_eq!(restored.state_hash(), state.state_hash());
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let engine = Engine::default();
        let json = GameSnapshot::capture(&engine.new_game(Timestamp(1)))
            .to_json()
            .unwrap();
        for key in [
            "\"productionRate\"",
            "\"lastUpdateTimestamp\"",
            "\"prestigePoints\"",
            "\"highestCurrencyEverHeld\"",
            "\"sessionStartTimestamp\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn test_version_one_document_fills_defaults() {
        let engine = Engine::default();
        let snapshot = GameSnapshot::from_json(
            r#"{"currency": 250.5, "upgrades": [{"id": 2, "level": 3}], "prestigePoints": 4}"#,
        )
        .unwrap();
        assert_eq!(snapshot.version, 1);

        let state = snapshot.restore(&engine, Timestamp(42_000)).unwrap();
        assert_eq!(state.currency(), 250.5);
        assert_eq!(state.last_update(), Timestamp(42_000));
        assert_eq!(state.stats().session_start, Timestamp(42_000));
        assert_eq!(state.stats().total_earnings, 250.5);
        assert_eq!(state.stats().highest_currency_ever_held, 250.5);
        assert_eq!(state.stats().total_clicks, 0);
        assert_eq!(state.level(UpgradeId(1)), Some(0));
        assert_eq!(state.level(UpgradeId(2)), Some(3));
        assert_eq!(state.production_rate(), engine.rate_for(&state));
    }

    #[test]
    fn test_browser_stat_keys_are_read() {
        let engine = Engine::default();
        let snapshot = GameSnapshot::from_json(
            r#"{"coins": 300, "lastUpdate": 60000, "upgrades": [],
                "startTime": 1000, "highestCoins": 900, "totalClicks": 12}"#,
        )
        .unwrap();

        let state = snapshot.restore(&engine, Timestamp(60_000)).unwrap();
        assert_eq!(state.stats().session_start, Timestamp(1_000));
        assert_eq!(state.stats().highest_currency_ever_held, 900.0);
        assert_eq!(state.stats().total_clicks, 12);
    }

    #[test]
    fn test_new_catalog_entry_starts_at_level_zero() {
        let old = Engine::default();
        let state = played_state(&old);
        let snapshot = GameSnapshot::capture(&state);

        let mut definitions: Vec<_> = old.catalog().iter().cloned().collect();
        definitions.push(UpgradeDefinition::new(
            5,
            "Bank",
            UpgradeKind::Production,
            130_000.0,
            5_000.0,
        ));
        let extended = Engine::new(UpgradeCatalog::new(definitions).unwrap());

        let restored = snapshot.restore(&extended, Timestamp(0)).unwrap();
        assert_eq!(restored.level(UpgradeId(5)), Some(0));
        assert_eq!(restored.level(UpgradeId(2)), state.level(UpgradeId(2)));
        assert_eq!(restored.currency(), state.currency());
        assert_eq!(restored.prestige_points(), state.prestige_points());
    }

    #[test]
    fn test_unknown_ids_are_dropped() {
        let engine = Engine::default();
        let snapshot = GameSnapshot::from_json(
            r#"{"version": 2, "currency": 1, "upgrades": [{"id": 2, "level": 1}, {"id": 99, "level": 7}]}"#,
        )
        .unwrap();
        let state = snapshot.restore(&engine, Timestamp(0)).unwrap();
        assert_eq!(state.upgrades().len(), engine.catalog().len());
        assert_eq!(state.level(UpgradeId(99)), None);
    }

    #[test]
    fn test_structural_failures_are_corrupt() {
        let engine = Engine::default();
        let corrupt = |text: &str| {
            matches!(
                GameSnapshot::from_json(text).and_then(|s| s.restore(&engine, Timestamp(0))),
                Err(GameError::CorruptPersistedState(_))
            )
        };
        assert!(corrupt("not json"));
        assert!(corrupt(r#"{"version": 0, "currency": 1}"#));
        assert!(corrupt(r#"{"currency": -5}"#));
        assert!(corrupt(r#"{"currency": 1, "manualEarnings": -1}"#));
        assert!(corrupt(r#"{"prestigePoints": -1}"#));
        assert!(corrupt(
            r#"{"currency": 1, "upgrades": [{"id": 2, "level": 1}, {"id": 2, "level": 3}]}"#
        ));
    }

    #[test]
    fn test_oversized_history_is_trimmed() {
        let engine = Engine::default();
        let mut snapshot = GameSnapshot::capture(&engine.new_game(Timestamp(0)));
        snapshot.history = (0..100)
            .map(|t| HistorySample {
                timestamp: Timestamp(t),
                total_earnings: 0.0,
            })
            .collect();
        let state = snapshot.restore(&engine, Timestamp(0)).unwrap();
        assert_eq!(state.history().len(), MAX_HISTORY_SAMPLES);
        assert_eq!(state.history().latest().map(|s| s.timestamp), Some(Timestamp(99)));
    }

    #[test]
    fn test_memory_store_round_trip_and_clear() {
        let engine = Engine::default();
        let snapshot = GameSnapshot::capture(&played_state(&engine));
        let mut store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&snapshot).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().unwrap(), Some(snapshot));

        store.clear().unwrap();
        assert!(store.document().is_none());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store_reports_corrupt_document() {
        let store = MemoryStore::with_document("{broken");
        assert!(matches!(
            store.load(),
            Err(GameError::CorruptPersistedState(_))
        ));
    }
}
