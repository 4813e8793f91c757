//! Data structures for upgrade configuration.
//!
//! Upgrade definitions are immutable for the lifetime of an engine. They
//! are built in code ([`UpgradeCatalog::standard`]) or deserialized from
//! RON text ([`UpgradeCatalog::from_ron_str`]).
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading is handled by `idle_headless`.

mod upgrade_data;

pub use upgrade_data::{UpgradeCatalog, UpgradeDefinition, UpgradeId, UpgradeKind};
