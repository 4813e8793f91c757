//! Upgrade definitions and the validated catalog that owns them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::economy::GROWTH_FACTOR;
use crate::error::{GameError, Result};

/// Identifier of an upgrade type. Unique within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeId(pub u32);

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a level of an upgrade contributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    /// Adds `effect` currency per second per level.
    Production,
    /// Adds `effect` currency per manual action per level.
    Manual,
}

/// Immutable definition of one upgrade type.
///
/// # Example RON
///
/// ```ron
/// UpgradeDefinition(
///     id: 2,
///     name: "Farm",
///     kind: Production,
///     base_cost: 100.0,
///     effect: 5.0,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDefinition {
    /// Unique identifier.
    pub id: UpgradeId,
    /// Display name.
    pub name: String,
    /// Production or manual role.
    pub kind: UpgradeKind,
    /// Cost of the first level.
    pub base_cost: f64,
    /// Contribution per level (per second or per click, by `kind`).
    pub effect: f64,
}

impl UpgradeDefinition {
    /// Create a new definition.
    #[must_use]
    pub fn new(
        id: u32,
        name: impl Into<String>,
        kind: UpgradeKind,
        base_cost: f64,
        effect: f64,
    ) -> Self {
        Self {
            id: UpgradeId(id),
            name: name.into(),
            kind,
            base_cost,
            effect,
        }
    }

    /// Whether this upgrade feeds automatic production.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.kind == UpgradeKind::Production
    }
}

/// Ordered, validated set of upgrade definitions.
///
/// Guarantees unique ids, finite positive costs and effects, and exactly
/// one [`UpgradeKind::Manual`] definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UpgradeCatalog {
    definitions: Vec<UpgradeDefinition>,
}

impl UpgradeCatalog {
    /// Build a catalog, rejecting definitions that break a catalog invariant.
    pub fn new(definitions: Vec<UpgradeDefinition>) -> Result<Self> {
        let errors = validate_definitions(&definitions);
        if !errors.is_empty() {
            return Err(GameError::InvalidCatalog(errors.join("; ")));
        }
        Ok(Self { definitions })
    }

    /// The catalog the game ships with.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            definitions: vec![
                UpgradeDefinition::new(1, "Clicker", UpgradeKind::Manual, 10.0, 1.0),
                UpgradeDefinition::new(2, "Farm", UpgradeKind::Production, 100.0, 5.0),
                UpgradeDefinition::new(3, "Mine", UpgradeKind::Production, 1_100.0, 50.0),
                UpgradeDefinition::new(4, "Factory", UpgradeKind::Production, 12_000.0, 500.0),
            ],
        }
    }

    /// Parse and validate a catalog from RON text (a list of definitions).
    pub fn from_ron_str(source_name: &str, text: &str) -> Result<Self> {
        let definitions: Vec<UpgradeDefinition> =
            ron::from_str(text).map_err(|e| GameError::DataParseError {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })?;
        Self::new(definitions)
    }

    /// Serialize the catalog as pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(&self.definitions, ron::ser::PrettyConfig::default())
            .map_err(|e| GameError::Serialization(e.to_string()))
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn get(&self, id: UpgradeId) -> Option<&UpgradeDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    /// The single manual-action upgrade.
    #[must_use]
    pub fn manual(&self) -> &UpgradeDefinition {
        // `new` and `standard` both guarantee exactly one manual definition.
        self.definitions
            .iter()
            .find(|d| d.kind == UpgradeKind::Manual)
            .unwrap_or(&self.definitions[0])
    }

    /// Definitions in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &UpgradeDefinition> {
        self.definitions.iter()
    }

    /// Ids in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = UpgradeId> + '_ {
        self.definitions.iter().map(|d| d.id)
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Always false for a validated catalog; provided for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for UpgradeCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Check a definition list for catalog invariant violations.
///
/// Returns one message per problem; an empty list means the definitions
/// form a valid catalog.
#[must_use]
pub fn validate_definitions(definitions: &[UpgradeDefinition]) -> Vec<String> {
    let mut errors = Vec::new();

    if definitions.is_empty() {
        errors.push("catalog has no upgrades".to_string());
        return errors;
    }

    let mut seen = std::collections::HashSet::new();
    for def in definitions {
        if !seen.insert(def.id) {
            errors.push(format!("duplicate upgrade id {}", def.id));
        }
        if !(def.base_cost.is_finite() && def.base_cost > 0.0) {
            errors.push(format!(
                "upgrade {} '{}' has non-positive base cost {}",
                def.id, def.name, def.base_cost
            ));
        } else if def.base_cost * (GROWTH_FACTOR - 1.0) < 1.0 {
            // Below this, consecutive floored costs can repeat.
            errors.push(format!(
                "upgrade {} '{}' base cost {} is too low for costs to rise every level",
                def.id, def.name, def.base_cost
            ));
        }
        if !(def.effect.is_finite() && def.effect > 0.0) {
            errors.push(format!(
                "upgrade {} '{}' has non-positive effect {}",
                def.id, def.name, def.effect
            ));
        }
    }

    let manual = definitions
        .iter()
        .filter(|d| d.kind == UpgradeKind::Manual)
        .count();
    if manual != 1 {
        errors.push(format!("expected exactly one manual upgrade, found {manual}"));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD_RON: &str = include_str!("../../../../data/upgrades.ron");

    #[test]
    fn test_standard_catalog_is_valid() {
        let catalog = UpgradeCatalog::standard();
        let defs: Vec<_> = catalog.iter().cloned().collect();
        let errors = validate_definitions(&defs);
        assert!(errors.is_empty(), "Errors: {errors:?}");
        assert_eq!(catalog.manual().name, "Clicker");
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_shipped_ron_matches_standard_catalog() {
        let parsed = UpgradeCatalog::from_ron_str("upgrades.ron", STANDARD_RON).unwrap();
        assert_eq!(parsed, UpgradeCatalog::standard());
    }

    #[test]
    fn test_ron_round_trip() {
        let text = UpgradeCatalog::standard().to_ron_string().unwrap();
        let parsed = UpgradeCatalog::from_ron_str("generated", &text).unwrap();
        assert_eq!(parsed, UpgradeCatalog::standard());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = UpgradeCatalog::new(vec![
            UpgradeDefinition::new(1, "Clicker", UpgradeKind::Manual, 10.0, 1.0),
            UpgradeDefinition::new(1, "Farm", UpgradeKind::Production, 100.0, 5.0),
        ]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate upgrade id 1"), "{err}");
    }

    #[test]
    fn test_rejects_missing_manual_upgrade() {
        let result = UpgradeCatalog::new(vec![UpgradeDefinition::new(
            2,
            "Farm",
            UpgradeKind::Production,
            100.0,
            5.0,
        )]);
        assert!(matches!(result, Err(GameError::InvalidCatalog(_))));
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let errors = validate_definitions(&[
            UpgradeDefinition::new(1, "Clicker", UpgradeKind::Manual, 0.0, 1.0),
            UpgradeDefinition::new(2, "Farm", UpgradeKind::Production, 100.0, f64::NAN),
        ]);
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn test_rejects_base_cost_with_flat_levels() {
        let result = UpgradeCatalog::new(vec![
            UpgradeDefinition::new(1, "Clicker", UpgradeKind::Manual, 10.0, 1.0),
            UpgradeDefinition::new(2, "Cheap", UpgradeKind::Production, 0.5, 1.0),
        ]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("too low"), "{err}");

        let errors = validate_definitions(&[
            UpgradeDefinition::new(1, "Clicker", UpgradeKind::Manual, 6.0, 1.0),
            UpgradeDefinition::new(2, "Seven", UpgradeKind::Production, 7.0, 1.0),
        ]);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("Clicker"));
    }

    #[test]
    fn test_malformed_ron_is_parse_error() {
        let result = UpgradeCatalog::from_ron_str("broken.ron", "[UpgradeDefinition(id: ");
        assert!(matches!(result, Err(GameError::DataParseError { .. })));
    }

    #[test]
    fn test_lookup_by_id() {
        let catalog = UpgradeCatalog::standard();
        assert_eq!(catalog.get(UpgradeId(3)).map(|d| d.name.as_str()), Some("Mine"));
        assert!(catalog.get(UpgradeId(99)).is_none());
    }
}
