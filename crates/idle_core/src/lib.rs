//! # Idle Core
//!
//! Deterministic simulation core for an incremental idle economy.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No file or network IO
//! - No clock reads (time is always passed in)
//!
//! This separation enables:
//! - Headless drivers and batch balance runs
//! - Offline catch-up that is exactly reproducible
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`data`] - Upgrade definitions and the validated catalog
//! - [`economy`] - Pure cost, production, and prestige formulas
//! - [`engine`] - State transitions
//! - [`state`] - The game state aggregate
//! - [`persistence`] - Versioned snapshots and the store interface
//! - [`session`] - Single-owner driver glue with autosave
//! - [`report`] - Display projections and formatting
//! - [`math`] - Decimal precision helpers

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod data;
pub mod economy;
pub mod engine;
pub mod error;
pub mod math;
pub mod persistence;
pub mod report;
pub mod session;
pub mod state;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::data::{UpgradeCatalog, UpgradeDefinition, UpgradeId, UpgradeKind};
    pub use crate::engine::{Engine, OfflineReport, PurchaseQuantity};
    pub use crate::error::{GameError, Rejection, Result};
    pub use crate::persistence::{GameSnapshot, MemoryStore, SnapshotStore};
    pub use crate::report::StateReport;
    pub use crate::session::Session;
    pub use crate::state::{GameState, Timestamp};
}
