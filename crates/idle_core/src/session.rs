//! Single-owner session: one live state, its engine, and its store.
//!
//! A driver calls [`Session::tick`] on the short cadence with the current
//! time and forwards player commands. `&mut self` on every mutating call
//! means ticks and commands can never interleave.

use crate::data::UpgradeId;
use crate::engine::{Engine, OfflineReport, PurchaseQuantity};
use crate::error::{GameError, Rejection, Result};
use crate::persistence::{GameSnapshot, SnapshotStore};
use crate::report::StateReport;
use crate::state::{GameState, Timestamp};

/// Short accrual cadence in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 100;

/// Autosave and history-sample cadence in milliseconds.
pub const AUTOSAVE_INTERVAL_MS: u64 = 10_000;

/// A running game bound to a snapshot store.
#[derive(Debug)]
pub struct Session<S: SnapshotStore> {
    engine: Engine,
    store: S,
    state: GameState,
    last_autosave: Timestamp,
    store_writable: bool,
}

impl<S: SnapshotStore> Session<S> {
    /// Load the stored snapshot (or start fresh) and credit time away.
    ///
    /// A corrupt snapshot is discarded: the store is cleared and the
    /// session starts from defaults. Any other load failure also starts
    /// from defaults, but the store is left untouched and the session will
    /// not write to it, so a save that could not be read is never replaced.
    pub fn start(engine: Engine, mut store: S, now: Timestamp) -> (Self, Option<OfflineReport>) {
        let loaded = store
            .load()
            .and_then(|snapshot| snapshot.map(|s| s.restore(&engine, now)).transpose());

        let mut store_writable = true;
        let state = match loaded {
            Ok(Some(state)) => {
                tracing::info!(
                    currency = state.currency(),
                    last_update = state.last_update().as_millis(),
                    "Loaded saved game"
                );
                state
            }
            Ok(None) => {
                tracing::info!("No saved game, starting fresh");
                engine.new_game(now)
            }
            Err(e @ GameError::CorruptPersistedState(_)) => {
                tracing::warn!(error = %e, "Discarding corrupt save");
                if let Err(clear_err) = store.clear() {
                    tracing::warn!(error = %clear_err, "Failed to clear corrupt save");
                }
                engine.new_game(now)
            }
            Err(e) => {
                tracing::error!(error = %e, "Could not read save, playing without saving");
                store_writable = false;
                engine.new_game(now)
            }
        };

        let away = now.seconds_since(state.last_update());
        let (state, offline) = engine.reconcile(&state, away);

        let session = Self {
            engine,
            store,
            state,
            last_autosave: now,
            store_writable,
        };
        (session, offline)
    }

    /// Accrue up to `now`, then autosave if the save cadence has elapsed.
    ///
    /// A `now` earlier than the last update accrues nothing. Returns
    /// whether an autosave ran.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        if now > self.state.last_update() {
            let elapsed = now.seconds_since(self.state.last_update());
            self.state = self.engine.advance(&self.state, elapsed);
        }

        if now.millis_since(self.last_autosave) < AUTOSAVE_INTERVAL_MS {
            return false;
        }
        self.state = self.engine.sample_history(&self.state);
        self.last_autosave = now;
        if !self.store_writable {
            return false;
        }
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "Autosave failed");
        }
        true
    }

    /// Buy upgrade levels.
    pub fn purchase(
        &mut self,
        upgrade: UpgradeId,
        quantity: PurchaseQuantity,
    ) -> std::result::Result<(), Rejection> {
        self.state = self.engine.purchase(&self.state, upgrade, quantity)?;
        Ok(())
    }

    /// Perform one manual action.
    pub fn manual_action(&mut self) {
        self.state = self.engine.manual_action(&self.state);
    }

    /// Prestige if the threshold is met.
    pub fn prestige(&mut self) -> std::result::Result<(), Rejection> {
        self.state = self.engine.prestige(&self.state)?;
        Ok(())
    }

    /// Start over from defaults and wipe the stored snapshot.
    ///
    /// The in-memory reset happens even if clearing the store fails. A
    /// successful clear re-enables saving.
    pub fn reset_all(&mut self) -> Result<()> {
        self.state = self.engine.reset_all(&self.state);
        self.store.clear()?;
        self.store_writable = true;
        Ok(())
    }

    /// Write the current state to the store.
    ///
    /// Fails with [`GameError::Storage`] when the session started without
    /// being able to read the store.
    pub fn save(&mut self) -> Result<()> {
        if !self.store_writable {
            return Err(GameError::Storage(
                "saving disabled: the stored game could not be read".to_string(),
            ));
        }
        self.store.save(&GameSnapshot::capture(&self.state))?;
        tracing::debug!(currency = self.state.currency(), "Saved game");
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Whether the session writes to its store.
    #[must_use]
    pub fn is_persisting(&self) -> bool {
        self.store_writable
    }

    /// Engine driving this session.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Display projection as seen at `now`.
    #[must_use]
    pub fn report(&self, now: Timestamp) -> StateReport {
        StateReport::new(&self.engine, &self.state, now)
    }

    /// Replace the live state with one reconciled for a gap of
    /// `elapsed_seconds`, e.g. after the host was suspended.
    pub fn reconcile(&mut self, elapsed_seconds: f64) -> Option<OfflineReport> {
        let (state, offline) = self.engine.reconcile(&self.state, elapsed_seconds);
        self.state = state;
        offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    /// Store whose reads always fail with an IO-style error.
    #[derive(Debug, Default)]
    struct UnreadableStore {
        saves: usize,
        clears: usize,
    }

    impl SnapshotStore for UnreadableStore {
        fn load(&self) -> Result<Option<GameSnapshot>> {
            Err(GameError::Storage("read save.json: Input/output error".to_string()))
        }

        fn save(&mut self, _snapshot: &GameSnapshot) -> Result<()> {
            self.saves += 1;
            Ok(())
        }

        fn clear(&mut self) -> Result<()> {
            self.clears += 1;
            Ok(())
        }
    }

    fn fresh_session(now: u64) -> Session<MemoryStore> {
        Session::start(Engine::default(), MemoryStore::new(), Timestamp(now)).0
    }

    #[test]
    fn test_start_without_save_is_fresh() {
        let (session, offline) =
            Session::start(Engine::default(), MemoryStore::new(), Timestamp(1_000));
        assert!(offline.is_none());
        assert_eq!(session.state(), &Engine::default().new_game(Timestamp(1_000)));
    }

    #[test]
    fn test_corrupt_save_is_cleared() {
        let (session, offline) = Session::start(
            Engine::default(),
            MemoryStore::with_document("{\"currency\": -1}"),
            Timestamp(7),
        );
        assert!(offline.is_none());
        assert_eq!(session.state().currency(), 0.0);
        assert!(session.store().document().is_none());
    }

    #[test]
    fn test_read_failure_keeps_existing_save() {
        let (mut session, offline) =
            Session::start(Engine::default(), UnreadableStore::default(), Timestamp(0));
        assert!(offline.is_none());
        assert!(!session.is_persisting());
        assert_eq!(session.state().currency(), 0.0);

        for step in 1..=250 {
            assert!(!session.tick(Timestamp(step * TICK_INTERVAL_MS)));
        }
        assert!(matches!(session.save(), Err(GameError::Storage(_))));
        assert_eq!(session.store().clears, 0);
        assert_eq!(session.store().saves, 0);
        assert!((session.state().currency() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_after_read_failure_resumes_saving() {
        let (mut session, _) =
            Session::start(Engine::default(), UnreadableStore::default(), Timestamp(0));
        session.reset_all().unwrap();
        assert!(session.is_persisting());
        session.save().unwrap();
        assert_eq!(session.store().clears, 1);
        assert_eq!(session.store().saves, 1);
    }

    #[test]
    fn test_ticks_accrue_and_autosave_on_cadence() {
        let mut session = fresh_session(0);
        let mut saves = 0;
        for step in 1..=250 {
            if session.tick(Timestamp(step * TICK_INTERVAL_MS)) {
                saves += 1;
            }
        }
        // 25 s of ticks: autosaves at 10 s and 20 s.
        assert_eq!(saves, 2);
        assert_eq!(session.store().save_count(), 2);
        assert_eq!(session.state().history().len(), 2);
        assert_eq!(session.state().last_update(), Timestamp(25_000));
        assert!((session.state().currency() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_order_tick_accrues_nothing() {
        let mut session = fresh_session(5_000);
        session.tick(Timestamp(6_000));
        let before = session.state().clone();
        session.tick(Timestamp(5_500));
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_restart_credits_offline_time() {
        let mut session = fresh_session(0);
        session.tick(Timestamp(10_000));
        let store = session.store().clone();
        let saved_currency = session.state().currency();

        let (resumed, offline) = Session::start(Engine::default(), store, Timestamp(110_000));
        let offline = offline.unwrap();
        assert_eq!(offline.elapsed_seconds, 100.0);
        assert!((offline.earnings - 10.0).abs() < 1e-9);
        assert!((resumed.state().currency() - (saved_currency + offline.earnings)).abs() < 1e-9);
        assert_eq!(resumed.state().last_update(), Timestamp(110_000));
    }

    #[test]
    fn test_rejected_command_keeps_state() {
        let mut session = fresh_session(0);
        let before = session.state().clone();
        let result = session.purchase(UpgradeId(4), PurchaseQuantity::Count(1));
        assert!(matches!(result, Err(Rejection::InsufficientFunds { .. })));
        assert_eq!(session.prestige().unwrap_err().reason(), "insufficient_funds");
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_reset_clears_store() {
        let mut session = fresh_session(0);
        session.manual_action();
        session.save().unwrap();
        assert!(session.store().document().is_some());

        session.reset_all().unwrap();
        assert!(session.store().document().is_none());
        assert_eq!(session.state().stats().total_clicks, 0);
        assert!(matches!(session.store().load(), Ok(None)));
    }

    #[test]
    fn test_report_reflects_session_state() {
        let mut session = fresh_session(0);
        session.manual_action();
        let report = session.report(Timestamp(3_000));
        assert_eq!(report.currency, 1.0);
        assert_eq!(report.time_played_ms, 3_000);
    }
}
