//! Semantic contract: the canonical columns each entity must or may expose.

use std::collections::{BTreeMap, BTreeSet};

/// Defines required and optional canonical columns per entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticContract {
    pub version: String,
    pub required_columns: BTreeMap<String, BTreeSet<String>>,
    pub optional_columns: BTreeMap<String, BTreeSet<String>>,
    /// `(entity, column)` to a recommended SQL type.
    pub recommended_types: BTreeMap<(String, String), String>,
    pub naming_rules: Vec<String>,
}

impl SemanticContract {
    pub fn required_for(&self, entity: &str) -> BTreeSet<String> {
        self.required_columns.get(entity).cloned().unwrap_or_default()
    }

    pub fn optional_for(&self, entity: &str) -> BTreeSet<String> {
        self.optional_columns.get(entity).cloned().unwrap_or_default()
    }

    pub fn recommended_type(&self, entity: &str, column: &str) -> Option<&str> {
        self.recommended_types
            .get(&(entity.to_string(), column.to_string()))
            .map(String::as_str)
    }
}

impl Default for SemanticContract {
    /// The v1 contract: every clinical entity is keyed by `person_id`.
    fn default() -> Self {
        let required = [
            "patients",
            "encounters",
            "medications",
            "procedures",
            "insurance",
            "diagnoses",
        ]
        .into_iter()
        .map(|entity| (entity.to_string(), set(&["person_id"])))
        .collect();

        let optional = BTreeMap::from([
            (
                "patients".to_string(),
                set(&["date_of_birth", "gender", "as_of_date", "pcp_name"]),
            ),
            (
                "encounters".to_string(),
                set(&["encounter_id", "encounter_date", "encounter_type"]),
            ),
            (
                "diagnoses".to_string(),
                set(&["diagnosis_code", "diagnosis_date"]),
            ),
        ]);

        let recommended_types = [
            ("patients", "person_id", "STRING"),
            ("patients", "date_of_birth", "DATE"),
            ("patients", "as_of_date", "DATE"),
            ("encounters", "encounter_date", "DATE"),
            ("diagnoses", "diagnosis_date", "DATE"),
        ]
        .into_iter()
        .map(|(entity, column, ty)| ((entity.to_string(), column.to_string()), ty.to_string()))
        .collect();

        Self {
            version: "v1".to_string(),
            required_columns: required,
            optional_columns: optional,
            recommended_types,
            naming_rules: vec!["lower_snake_case".to_string()],
        }
    }
}

fn set(columns: &[&str]) -> BTreeSet<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contract_has_expected_required_columns() {
        let contract = SemanticContract::default();
        assert_eq!(contract.version, "v1");
        assert!(contract.naming_rules.iter().any(|r| r == "lower_snake_case"));
        assert_eq!(contract.required_for("patients"), set(&["person_id"]));
        assert_eq!(contract.recommended_type("patients", "date_of_birth"), Some("DATE"));
    }

    #[test]
    fn test_helpers_default_to_empty_or_none() {
        let contract = SemanticContract {
            version: "vX".to_string(),
            required_columns: BTreeMap::new(),
            optional_columns: BTreeMap::new(),
            recommended_types: BTreeMap::new(),
            naming_rules: Vec::new(),
        };
        assert!(contract.required_for("patients").is_empty());
        assert!(contract.optional_for("patients").is_empty());
        assert_eq!(contract.recommended_type("patients", "person_id"), None);
    }
}
