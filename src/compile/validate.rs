//! Document-level checks run before any feature is built.

use regex::Regex;
use std::sync::LazyLock;

use crate::contract::SemanticContract;
use crate::error::{Error, Result};
use crate::schema::{PipelineDocument, DEFAULT_SPINE_KEY, PERSON_GRAIN};

static CANONICAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid canonical name pattern"));

fn invalid_names<'a>(names: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
    names
        .into_iter()
        .map(String::as_str)
        .filter(|name| !CANONICAL_NAME.is_match(name))
        .collect()
}

/// Check the spine, grain, canonical naming and contract columns.
///
/// # Errors
///
/// `Error::Configuration` describing the first violated rule.
pub fn validate_pipeline(document: &PipelineDocument, contract: &SemanticContract) -> Result<()> {
    let pipeline = &document.pipeline;
    let mapping = &document.mapping;
    let spine = &pipeline.spine;

    if !mapping.has_entity(&spine.entity) {
        return Err(Error::configuration(format!(
            "Spine entity '{}' is not mapped in mapping.entities",
            spine.entity
        )));
    }

    let spine_columns = mapping.entity_columns(&spine.entity)?;
    if !spine_columns.contains_key(&spine.key) {
        return Err(Error::configuration(format!(
            "Spine key '{}' is not mapped for entity '{}'",
            spine.key, spine.entity
        )));
    }

    let missing: Vec<&str> = spine
        .columns
        .iter()
        .filter(|column| !spine_columns.contains_key(*column))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::configuration(format!(
            "Spine columns are missing from mapping for entity '{}': {missing:?}",
            spine.entity
        )));
    }

    if pipeline.grain != PERSON_GRAIN && spine.key == DEFAULT_SPINE_KEY {
        return Err(Error::configuration(format!(
            "Non-PERSON grain '{}' requires a spine key other than '{DEFAULT_SPINE_KEY}'",
            pipeline.grain
        )));
    }

    let bad_entities = invalid_names(mapping.entities.keys().chain(mapping.references.keys()));
    if !bad_entities.is_empty() {
        return Err(Error::configuration(format!(
            "Invalid canonical entity names: {bad_entities:?}"
        )));
    }
    for (name, entity) in mapping.entities.iter().chain(&mapping.references) {
        let bad_columns = invalid_names(entity.columns.keys());
        if !bad_columns.is_empty() {
            return Err(Error::configuration(format!(
                "Invalid canonical column names for '{name}': {bad_columns:?}"
            )));
        }
    }

    for (entity, required) in &contract.required_columns {
        let Some(mapped) = mapping.entities.get(entity) else {
            continue;
        };
        let missing: Vec<&str> = required
            .iter()
            .filter(|column| !mapped.columns.contains_key(*column))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::configuration(format!(
                "Entity '{entity}' is missing required columns: {missing:?}"
            )));
        }
    }

    Ok(())
}
