//! Pipeline document schema.
//!
//! A pipeline document has four sections: `mapping` (canonical entities and
//! reference tables mapped to physical tables), `pipeline` (identity, spine,
//! output and policies), `features` (ordered selections) and an optional
//! `profiling` block. Every struct rejects unknown keys.

mod loader;

pub use loader::{load_mapping_spec, load_pipeline_document, parse_pipeline_document};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::features::Params;

/// Mapping for a canonical entity or reference table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EntityMapping {
    /// Physical table name.
    pub table: String,

    /// Canonical column name to physical column expression.
    pub columns: BTreeMap<String, String>,
}

/// Mapping specification from canonical entities to physical tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MappingSpec {
    pub entities: BTreeMap<String, EntityMapping>,

    #[serde(default)]
    pub references: BTreeMap<String, EntityMapping>,
}

impl MappingSpec {
    pub fn has_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// True when `column` is mapped on the entity or reference named `entity`.
    pub fn has_column(&self, entity: &str, column: &str) -> bool {
        self.lookup(entity)
            .is_some_and(|mapping| mapping.columns.contains_key(column))
    }

    /// Physical table for an entity or reference.
    pub fn entity_table(&self, entity: &str) -> Result<&str> {
        self.lookup(entity)
            .map(|mapping| mapping.table.as_str())
            .ok_or_else(|| Error::configuration(format!("Unknown entity or reference: {entity}")))
    }

    /// Canonical-to-physical column map for an entity or reference.
    pub fn entity_columns(&self, entity: &str) -> Result<&BTreeMap<String, String>> {
        self.lookup(entity)
            .map(|mapping| &mapping.columns)
            .ok_or_else(|| Error::configuration(format!("Unknown entity or reference: {entity}")))
    }

    fn lookup(&self, name: &str) -> Option<&EntityMapping> {
        self.entities
            .get(name)
            .or_else(|| self.references.get(name))
    }
}

/// How a feature prefix is derived from its key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefixScheme {
    /// First dot-segment of the feature key.
    #[default]
    Namespace,
    /// The full feature key.
    Feature,
}

/// Config for column name prefixing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub scheme: PrefixScheme,

    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for PrefixingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: PrefixScheme::default(),
            separator: default_separator(),
        }
    }
}

fn default_separator() -> String {
    "__".to_string()
}

/// What to do when two output columns resolve to the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    Fail,
    AutoPrefix,
}

/// Config for output column naming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    #[serde(default)]
    pub prefixing: PrefixingConfig,

    #[serde(default)]
    pub collision_policy: CollisionPolicy,
}

/// Pipeline-wide policy for recoverable feature problems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingColumnPolicy {
    #[default]
    Fail,
    WarnSkip,
}

/// Validation policy options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationConfig {
    #[serde(default)]
    pub on_missing_required_column: MissingColumnPolicy,
}

/// Spine configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SpineConfig {
    pub entity: String,

    #[serde(default = "default_spine_key")]
    pub key: String,

    pub columns: Vec<String>,
}

pub(crate) const DEFAULT_SPINE_KEY: &str = "person_id";

fn default_spine_key() -> String {
    DEFAULT_SPINE_KEY.to_string()
}

/// Output materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Materialization {
    #[default]
    Table,
    View,
}

/// Output table configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub table: String,

    #[serde(default)]
    pub materialization: Materialization,
}

/// Where the generated project will run; selects the model naming strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTarget {
    #[default]
    Local,
    Databricks,
}

/// Pipeline metadata and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineMeta {
    pub name: String,

    /// Identifier-safe slug used in namespaced schemas. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    pub version: String,

    #[serde(default = "default_grain")]
    pub grain: String,

    #[serde(default)]
    pub execution_target: ExecutionTarget,

    pub spine: SpineConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub validation: ValidationConfig,
}

pub(crate) const PERSON_GRAIN: &str = "PERSON";

fn default_grain() -> String {
    PERSON_GRAIN.to_string()
}

impl PipelineMeta {
    pub fn slug(&self) -> &str {
        self.slug.as_deref().unwrap_or(&self.name)
    }
}

/// Feature selection with params.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    pub key: String,

    #[serde(default)]
    pub params: Params,
}

impl FeatureConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }
}

/// Row sampling used by the profiling notebook.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    #[default]
    Random,
    Deterministic,
}

impl SamplingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingMode::Random => "random",
            SamplingMode::Deterministic => "deterministic",
        }
    }
}

/// Profiling notebook configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilingConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sample_rows")]
    pub sample_rows: u64,

    #[serde(default)]
    pub sampling_mode: SamplingMode,

    #[serde(default = "default_sampling_seed")]
    pub sampling_seed: i64,

    #[serde(default)]
    pub profile_raw_entities: Vec<String>,

    #[serde(default = "default_true")]
    pub profile_output: bool,

    #[serde(default)]
    pub output_dir: Option<String>,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sample_rows: default_sample_rows(),
            sampling_mode: SamplingMode::default(),
            sampling_seed: default_sampling_seed(),
            profile_raw_entities: Vec::new(),
            profile_output: true,
            output_dir: None,
        }
    }
}

fn default_sample_rows() -> u64 {
    100_000
}

fn default_sampling_seed() -> i64 {
    42
}

fn default_true() -> bool {
    true
}

/// Top-level document including mapping and pipeline sections.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDocument {
    pub mapping: MappingSpec,

    pub pipeline: PipelineMeta,

    #[serde(default)]
    pub features: Vec<FeatureConfig>,

    #[serde(default)]
    pub profiling: Option<ProfilingConfig>,
}
