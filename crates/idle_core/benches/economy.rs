//! Economy benchmarks for idle_core.
//!
//! Run with: `cargo bench -p idle_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use idle_core::data::{UpgradeCatalog, UpgradeId};
use idle_core::economy::{compute_production_rate, max_affordable_quantity};
use idle_core::engine::{Engine, PurchaseQuantity};
use idle_core::state::Timestamp;

/// Cost and rate formulas on their own.
pub fn formula_benchmark(c: &mut Criterion) {
    let catalog = UpgradeCatalog::standard();
    let farm = catalog.get(UpgradeId(2)).cloned().unwrap_or_else(|| catalog.manual().clone());

    c.bench_function("max_affordable_1e30", |b| {
        b.iter(|| max_affordable_quantity(black_box(&farm), black_box(10), black_box(1e30)));
    });

    let engine = Engine::new(catalog.clone());
    let state = engine.new_game(Timestamp::ZERO);
    c.bench_function("compute_production_rate", |b| {
        b.iter(|| compute_production_rate(black_box(state.upgrades()), &catalog, black_box(25)));
    });
}

/// A minute of play at the 100 ms tick cadence with periodic purchases.
pub fn session_minute_benchmark(c: &mut Criterion) {
    let engine = Engine::default();

    c.bench_function("advance_600_ticks", |b| {
        b.iter(|| {
            let mut state = engine.new_game(Timestamp::ZERO);
            for tick in 0..600 {
                state = engine.advance(&state, 0.1);
                state = engine.manual_action(&state);
                if tick % 50 == 0 {
                    if let Ok(next) =
                        engine.purchase(&state, UpgradeId(2), PurchaseQuantity::Max)
                    {
                        state = next;
                    }
                }
            }
            black_box(state.state_hash())
        });
    });
}

criterion_group!(benches, formula_benchmark, session_minute_benchmark);
criterion_main!(benches);
