//! Model naming for local and Databricks execution targets.
//!
//! Every generated model name (semantic views, feature models) and every
//! model file name goes through a [`ModelNamer`], selected from the
//! pipeline's `execution_target`.

use regex::Regex;
use std::fmt::Debug;
use std::sync::LazyLock;

use crate::config::DatabricksSettings;
use crate::error::{Error, Result};
use crate::schema::{ExecutionTarget, PipelineMeta};

static IDENTIFIER_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid identifier pattern"));

/// Check one part of a dotted identifier.
pub fn validate_identifier_part(value: &str, label: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::configuration(format!("{label} must be non-empty")));
    }
    if value.contains('`') {
        return Err(Error::configuration(format!(
            "{label} must not contain backticks: {value:?}"
        )));
    }
    if !IDENTIFIER_PART.is_match(value) {
        return Err(Error::configuration(format!(
            "{label} must match ^[A-Za-z0-9_]+$: {value:?}"
        )));
    }
    Ok(())
}

/// Parse a `catalog.schema.table` identifier.
pub fn parse_three_part_table(identifier: &str) -> Result<(String, String, String)> {
    let parts: Vec<&str> = identifier.split('.').collect();
    let [catalog, schema, table] = parts.as_slice() else {
        return Err(Error::configuration(format!(
            "Expected a 3-part identifier 'catalog.schema.table', got {identifier:?}"
        )));
    };
    validate_identifier_part(catalog, "catalog")?;
    validate_identifier_part(schema, "schema")?;
    validate_identifier_part(table, "table")?;
    Ok((catalog.to_string(), schema.to_string(), table.to_string()))
}

/// Convert a dotted feature key into an identifier-safe slug.
///
/// `geisinger.forward_65_flag` becomes `geisinger__forward_65_flag`.
pub fn feature_slug(feature_key: &str) -> Result<String> {
    let parts: Vec<&str> = feature_key.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(Error::configuration(format!(
            "Invalid feature key: {feature_key:?}"
        )));
    }
    for part in &parts {
        validate_identifier_part(part, "feature key segment")?;
    }
    Ok(parts.join("__"))
}

/// Naming strategy consulted for every generated model.
pub trait ModelNamer: Debug + Send + Sync {
    /// Model name of the semantic view over a mapped entity.
    fn semantic_entity_model(&self, entity: &str) -> Result<String>;

    /// Model name of the semantic view over a reference table.
    fn semantic_reference_model(&self, reference: &str) -> Result<String>;

    /// Model name of an auxiliary model owned by a feature.
    fn feature_model(&self, feature_key: &str, purpose: &str) -> Result<String>;

    /// File stem (no extension) a feature model is written under.
    fn model_file_stem(&self, model_name: &str) -> String;
}

/// Flat `semantic.*` / `features.*` schemas for local engines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNaming;

impl ModelNamer for LocalNaming {
    fn semantic_entity_model(&self, entity: &str) -> Result<String> {
        Ok(format!("semantic.{entity}"))
    }

    fn semantic_reference_model(&self, reference: &str) -> Result<String> {
        Ok(format!("semantic.reference__{reference}"))
    }

    fn feature_model(&self, feature_key: &str, purpose: &str) -> Result<String> {
        let slug = feature_slug(feature_key)?;
        validate_identifier_part(purpose, "feature model purpose")?;
        Ok(format!("features.{slug}__{purpose}"))
    }

    fn model_file_stem(&self, model_name: &str) -> String {
        model_name.replace('.', "__")
    }
}

/// Resolved Databricks namespaces for internal and output relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabricksNamespaces {
    pub catalog: String,
    pub base_schema: String,
    pub semantic_schema: String,
    pub features_schema: String,
    pub output_table: String,
}

impl DatabricksNamespaces {
    /// Derive per-pipeline schemas next to the output table's schema.
    pub fn resolve(
        output_table: &str,
        pipeline_slug: &str,
        settings: &DatabricksSettings,
    ) -> Result<Self> {
        let (catalog, base_schema, table) = parse_three_part_table(output_table)?;
        validate_identifier_part(pipeline_slug, "pipeline slug")?;

        let semantic_schema = format!(
            "{base_schema}__{pipeline_slug}{}",
            settings.semantic_schema_suffix
        );
        let features_schema = format!(
            "{base_schema}__{pipeline_slug}{}",
            settings.features_schema_suffix
        );
        validate_identifier_part(&semantic_schema, "semantic schema")?;
        validate_identifier_part(&features_schema, "features schema")?;

        Ok(Self {
            catalog,
            base_schema,
            semantic_schema,
            features_schema,
            output_table: table,
        })
    }

    pub fn semantic_namespace(&self) -> String {
        format!("{}.{}", self.catalog, self.semantic_schema)
    }

    pub fn features_namespace(&self) -> String {
        format!("{}.{}", self.catalog, self.features_schema)
    }
}

/// Three-part names under pipeline-scoped schemas in one catalog.
#[derive(Debug, Clone)]
pub struct DatabricksNaming {
    namespaces: DatabricksNamespaces,
}

impl DatabricksNaming {
    pub fn new(namespaces: DatabricksNamespaces) -> Self {
        Self { namespaces }
    }

    pub fn namespaces(&self) -> &DatabricksNamespaces {
        &self.namespaces
    }
}

impl ModelNamer for DatabricksNaming {
    fn semantic_entity_model(&self, entity: &str) -> Result<String> {
        validate_identifier_part(entity, "entity")?;
        Ok(format!("{}.{entity}", self.namespaces.semantic_namespace()))
    }

    fn semantic_reference_model(&self, reference: &str) -> Result<String> {
        validate_identifier_part(reference, "reference")?;
        Ok(format!(
            "{}.reference__{reference}",
            self.namespaces.semantic_namespace()
        ))
    }

    fn feature_model(&self, feature_key: &str, purpose: &str) -> Result<String> {
        let slug = feature_slug(feature_key)?;
        validate_identifier_part(purpose, "feature model purpose")?;
        Ok(format!(
            "{}.{slug}__{purpose}",
            self.namespaces.features_namespace()
        ))
    }

    fn model_file_stem(&self, model_name: &str) -> String {
        last_segment(model_name).to_string()
    }
}

/// Select the naming strategy for a pipeline.
pub fn namer_for(
    pipeline: &PipelineMeta,
    settings: &DatabricksSettings,
) -> Result<Box<dyn ModelNamer>> {
    match pipeline.execution_target {
        ExecutionTarget::Local => Ok(Box::new(LocalNaming)),
        ExecutionTarget::Databricks => {
            let namespaces =
                DatabricksNamespaces::resolve(&pipeline.output.table, pipeline.slug(), settings)?;
            Ok(Box::new(DatabricksNaming::new(namespaces)))
        }
    }
}

/// Last dotted segment of a model name.
pub fn last_segment(model_name: &str) -> &str {
    model_name.rsplit('.').next().unwrap_or(model_name)
}
