//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the engine produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Offline catch-up and replayed sessions must land on exactly the same
//! state. Sources of non-determinism include:
//!
//! - **Clock reads**: the engine never reads a clock; every test passes
//!   time in explicitly.
//! - **Float accumulation order**: every transition rounds to a fixed
//!   precision, and replays must apply commands in the same order.
//! - **HashMap iteration order**: upgrade levels live in catalog order.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: individual transitions are pure
//! 2. **Property tests**: random command scripts replay identically
//! 3. **Snapshot tests**: save/restore mid-script does not change the outcome
//! 4. **Parallel tests**: running N replays on threads all match

use std::thread;

use idle_core::data::UpgradeId;
use idle_core::engine::{Engine, PurchaseQuantity};
use idle_core::persistence::GameSnapshot;
use idle_core::state::GameState;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps applied per run.
    pub steps: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic engine).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Engine is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// One scripted player or clock input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptStep {
    /// Advance the clock by this many seconds.
    Advance(f64),
    /// Offline gap of this many seconds.
    Reconcile(f64),
    /// One manual action.
    Click,
    /// Attempt a purchase; rejections are ignored.
    Purchase(UpgradeId, PurchaseQuantity),
    /// Attempt a prestige; rejections are ignored.
    Prestige,
    /// Record a history sample.
    Sample,
}

/// Apply one scripted step. Rejected commands leave the state as it was.
#[must_use]
pub fn apply_step(engine: &Engine, state: &GameState, step: ScriptStep) -> GameState {
    match step {
        ScriptStep::Advance(seconds) => engine.advance(state, seconds),
        ScriptStep::Reconcile(seconds) => engine.reconcile(state, seconds).0,
        ScriptStep::Click => engine.manual_action(state),
        ScriptStep::Purchase(id, quantity) => engine
            .purchase(state, id, quantity)
            .unwrap_or_else(|_| state.clone()),
        ScriptStep::Prestige => engine.prestige(state).unwrap_or_else(|_| state.clone()),
        ScriptStep::Sample => engine.sample_history(state),
    }
}

/// Apply a whole script, returning the final state.
#[must_use]
pub fn replay(engine: &Engine, start: &GameState, script: &[ScriptStep]) -> GameState {
    script
        .iter()
        .fold(start.clone(), |state, &step| apply_step(engine, &state, step))
}

/// Replay `script` `runs` times from the same start and compare hashes.
#[must_use]
pub fn verify_replay_determinism(
    engine: &Engine,
    start: &GameState,
    script: &[ScriptStep],
    runs: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = (0..runs)
        .map(|_| replay(engine, start, script).state_hash())
        .collect();
    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        steps: script.len() as u64,
    }
}

/// Replay `script` on `threads` scoped threads and compare hashes.
///
/// # Panics
///
/// Panics if a replay thread panics.
#[must_use]
pub fn verify_parallel_replays(
    engine: &Engine,
    start: &GameState,
    script: &[ScriptStep],
    threads: usize,
) -> DeterminismResult {
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| s.spawn(|| replay(engine, start, script).state_hash()))
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("replay thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        steps: script.len() as u64,
    }
}

/// Replay a script twice, round-tripping the second run through a JSON
/// snapshot after every step, and report the first step where they differ.
///
/// `None` means save/restore never changed the outcome.
#[must_use]
pub fn find_snapshot_divergence(
    engine: &Engine,
    start: &GameState,
    script: &[ScriptStep],
) -> Option<usize> {
    let mut direct = start.clone();
    let mut restored = start.clone();

    for (index, &step) in script.iter().enumerate() {
        direct = apply_step(engine, &direct, step);
        let next = apply_step(engine, &restored, step);
        restored = match GameSnapshot::capture(&next)
            .to_json()
            .and_then(|json| GameSnapshot::from_json(&json))
            .and_then(|snapshot| snapshot.restore(engine, next.last_update()))
        {
            Ok(state) => state,
            Err(_) => return Some(index),
        };

        if direct.state_hash() != restored.state_hash() {
            return Some(index);
        }
    }

    None
}

/// Proptest strategies for engine inputs.
pub mod strategies {
    use idle_core::data::{UpgradeDefinition, UpgradeId, UpgradeKind};
    use idle_core::engine::PurchaseQuantity;
    use proptest::prelude::*;

    use super::ScriptStep;

    /// A production upgrade definition.
    ///
    /// Base cost starts at 7: below that, `floor(base * 1.15^n)` can repeat
    /// across consecutive levels and costs are only non-decreasing.
    pub fn arb_production_definition() -> impl Strategy<Value = UpgradeDefinition> {
        (7.0f64..1.0e6, 0.1f64..1.0e4).prop_map(|(base_cost, effect)| {
            UpgradeDefinition::new(2, "Generated", UpgradeKind::Production, base_cost.floor(), effect)
        })
    }

    /// A currently owned level in a range long sessions reach.
    pub fn arb_level() -> impl Strategy<Value = u32> {
        0u32..200
    }

    /// A balance between nothing and far more than any level costs.
    pub fn arb_balance() -> impl Strategy<Value = f64> {
        prop_oneof![0.0f64..1.0e4, 1.0e4f64..1.0e12]
    }

    /// A purchase quantity, including the rejected zero.
    pub fn arb_quantity() -> impl Strategy<Value = PurchaseQuantity> {
        prop_oneof![
            (0u32..20).prop_map(PurchaseQuantity::Count),
            Just(PurchaseQuantity::Max),
        ]
    }

    /// One step of a standard-catalog script.
    pub fn arb_step() -> impl Strategy<Value = ScriptStep> {
        prop_oneof![
            (0.0f64..120.0).prop_map(ScriptStep::Advance),
            (0.0f64..86_400.0).prop_map(ScriptStep::Reconcile),
            Just(ScriptStep::Click),
            ((1u32..=4), arb_quantity())
                .prop_map(|(id, quantity)| ScriptStep::Purchase(UpgradeId(id), quantity)),
            Just(ScriptStep::Prestige),
            Just(ScriptStep::Sample),
        ]
    }

    /// A script of up to `max_len` steps.
    pub fn arb_script(max_len: usize) -> impl Strategy<Value = Vec<ScriptStep>> {
        proptest::collection::vec(arb_step(), 0..max_len)
    }
}
