//! Upgrade catalog loading for the driver.
//!
//! Catalogs are RON lists of upgrade definitions. When no path is given the
//! driver looks in the usual data locations and falls back to the built-in
//! catalog.

use std::fs;
use std::path::{Path, PathBuf};

use idle_core::data::UpgradeCatalog;
use idle_core::error::{GameError, Result};

/// Environment variable naming a catalog file.
pub const CATALOG_ENV_VAR: &str = "IDLE_CATALOG_PATH";

/// Load and validate a catalog from a RON file.
pub fn load_catalog_file(path: &Path) -> Result<UpgradeCatalog> {
    let content = fs::read_to_string(path).map_err(|e| GameError::DataParseError {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;
    let catalog = UpgradeCatalog::from_ron_str(&path.display().to_string(), &content)?;
    tracing::info!(path = %path.display(), upgrades = catalog.len(), "Loaded upgrade catalog");
    Ok(catalog)
}

/// Resolve the default catalog file.
///
/// Looks in order at:
/// 1. Environment variable `IDLE_CATALOG_PATH`
/// 2. `./data/upgrades.ron` (repo root)
/// 3. `../../data/upgrades.ron` (running from a crate directory)
pub fn default_catalog_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CATALOG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    ["data/upgrades.ron", "../../data/upgrades.ron"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

/// Load the catalog at `path`, or the default one.
///
/// An explicit path must load. A default file that fails to load is logged
/// and replaced by the built-in catalog.
pub fn resolve_catalog(path: Option<&Path>) -> Result<UpgradeCatalog> {
    if let Some(path) = path {
        return load_catalog_file(path);
    }

    match default_catalog_path() {
        Some(path) => load_catalog_file(&path).or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Falling back to built-in catalog");
            Ok(UpgradeCatalog::standard())
        }),
        None => {
            tracing::debug!("No catalog file found, using built-in catalog");
            Ok(UpgradeCatalog::standard())
        }
    }
}
