//! Feature interfaces and data structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::contract::SemanticContract;
use crate::error::{Error, Result};
use crate::naming::ModelNamer;
use crate::schema::{MappingSpec, NamingConfig, PipelineDocument};

/// Parameter values as supplied by a pipeline document.
pub type Params = BTreeMap<String, Value>;

/// Alias of the spine relation in the final statement.
pub const SPINE_ALIAS: &str = "p";

/// Declared type of a feature parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Int,
    Float,
    Bool,
    Str,
    Date,
    Enum,
    /// A canonical column, `column` on the spine or `entity.column`.
    ColumnRef,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::Str => "str",
            ParamType::Date => "date",
            ParamType::Enum => "enum",
            ParamType::ColumnRef => "column_ref",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "int" => Ok(ParamType::Int),
            "float" => Ok(ParamType::Float),
            "bool" => Ok(ParamType::Bool),
            "str" => Ok(ParamType::Str),
            "date" => Ok(ParamType::Date),
            "enum" => Ok(ParamType::Enum),
            "column_ref" => Ok(ParamType::ColumnRef),
            other => Err(Error::validation(format!("Unknown param type: {other}"))),
        }
    }
}

/// Declaration of one feature parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<String>>,
}

impl ParamSpec {
    /// A required parameter with no default.
    pub fn new(name: &str, param_type: ParamType) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: true,
            default: None,
            enum_values: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_enum_values(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }
}

/// Canonical columns a feature needs on one entity or reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRequirement {
    pub entity: String,
    pub columns: BTreeSet<String>,
}

impl FeatureRequirement {
    pub fn new(entity: &str, columns: &[&str]) -> Self {
        Self {
            entity: entity.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// An output column a feature provides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: Option<String>,
    pub description: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype: None,
            description: None,
        }
    }

    pub fn with_dtype(mut self, dtype: &str) -> Self {
        self.dtype = Some(dtype.to_string());
        self
    }
}

/// Everything the compiler needs to know about a feature before building it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMetadata {
    /// Dotted key, unique within a registry.
    pub key: String,
    pub description: Option<String>,
    pub params: Vec<ParamSpec>,
    pub requirements: Vec<FeatureRequirement>,
    pub provides: Vec<ColumnSpec>,
    /// `None` means compatible with every grain.
    pub compatible_grains: Option<Vec<String>>,
}

impl FeatureMetadata {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            description: None,
            params: Vec::new(),
            requirements: Vec::new(),
            provides: Vec::new(),
            compatible_grains: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_requirement(mut self, requirement: FeatureRequirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_provides(mut self, column: ColumnSpec) -> Self {
        self.provides.push(column);
        self
    }

    pub fn with_grains(mut self, grains: &[&str]) -> Self {
        self.compatible_grains = Some(grains.iter().map(|g| g.to_string()).collect());
        self
    }

    pub fn provided_names(&self) -> BTreeSet<String> {
        self.provides.iter().map(|c| c.name.clone()).collect()
    }

    pub fn supports_grain(&self, grain: &str) -> bool {
        self.compatible_grains
            .as_ref()
            .is_none_or(|grains| grains.iter().any(|g| g == grain))
    }
}

/// Kind of a generated model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    Table,
    View,
}

/// A generated SQLMesh model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub sql: String,
    pub kind: ModelKind,
    pub tags: Vec<String>,
}

impl ModelSpec {
    pub fn view(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            kind: ModelKind::View,
            tags: Vec::new(),
        }
    }

    pub fn table(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            kind: ModelKind::Table,
            ..Self::view(name, sql)
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Type of join against the spine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL OUTER",
        }
    }
}

/// A model joined into the final statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinModelSpec {
    pub model_name: String,
    pub alias: String,
    pub on: String,
    pub join_type: JoinType,
}

/// A SQLMesh test fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSpec {
    pub name: String,
    pub yaml: String,
}

/// What a feature build produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureAssets {
    pub models: Vec<ModelSpec>,
    pub join_models: Vec<JoinModelSpec>,
    /// `<expr> AS <alias>` fragments.
    pub select_expressions: Vec<String>,
    pub tests: Vec<TestSpec>,
}

impl FeatureAssets {
    pub fn with_select(mut self, expression: impl Into<String>) -> Self {
        self.select_expressions.push(expression.into());
        self
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_join(mut self, join: JoinModelSpec) -> Self {
        self.join_models.push(join);
        self
    }

    pub fn with_test(mut self, test: TestSpec) -> Self {
        self.tests.push(test);
        self
    }
}

/// A feature unit: declared metadata plus a pure build function.
///
/// This is the extension point for client-specific features.
pub trait Feature: Send + Sync {
    fn metadata(&self) -> &FeatureMetadata;

    /// Build SQL fragments from validated parameters.
    fn build(&self, ctx: &BuildContext<'_>, params: &Params) -> Result<FeatureAssets>;
}

/// A resolved column reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ColumnRef {
    pub entity: String,
    pub column: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity, self.column)
    }
}

/// Inputs available to a feature build.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub pipeline_name: String,
    pub pipeline_slug: String,
    pub grain: String,
    pub spine_entity: String,
    pub spine_alias: String,
    pub mapping: &'a MappingSpec,
    pub contract: &'a SemanticContract,
    pub naming: &'a NamingConfig,
    pub models: &'a dyn ModelNamer,
}

impl<'a> BuildContext<'a> {
    pub fn from_document(
        document: &'a PipelineDocument,
        contract: &'a SemanticContract,
        models: &'a dyn ModelNamer,
    ) -> Self {
        let pipeline = &document.pipeline;
        Self {
            pipeline_name: pipeline.name.clone(),
            pipeline_slug: pipeline.slug().to_string(),
            grain: pipeline.grain.clone(),
            spine_entity: pipeline.spine.entity.clone(),
            spine_alias: SPINE_ALIAS.to_string(),
            mapping: &document.mapping,
            contract,
            naming: &pipeline.naming,
            models,
        }
    }

    /// Split `entity.column`; a bare name refers to the spine entity.
    pub fn resolve_column_ref(&self, raw: &str) -> ColumnRef {
        match raw.split_once('.') {
            Some((entity, column)) => ColumnRef {
                entity: entity.to_string(),
                column: column.to_string(),
            },
            None => ColumnRef {
                entity: self.spine_entity.clone(),
                column: raw.to_string(),
            },
        }
    }

    /// SQL for a spine column reference, qualified with the spine alias.
    pub fn column_ref_sql(&self, raw: &str) -> Result<String> {
        let column_ref = self.resolve_column_ref(raw);
        if column_ref.entity != self.spine_entity {
            return Err(Error::validation(format!(
                "Column ref '{raw}' is not on the spine entity '{}'",
                self.spine_entity
            )));
        }
        Ok(format!("{}.{}", self.spine_alias, column_ref.column))
    }

    pub fn semantic_entity_model_name(&self, entity: &str) -> Result<String> {
        self.models.semantic_entity_model(entity)
    }

    pub fn semantic_reference_model_name(&self, reference: &str) -> Result<String> {
        self.models.semantic_reference_model(reference)
    }

    pub fn feature_model_name(&self, feature_key: &str, purpose: &str) -> Result<String> {
        self.models.feature_model(feature_key, purpose)
    }
}

/// Fetch a string parameter that validation has already type-checked.
pub fn str_param<'p>(params: &'p Params, name: &str) -> Result<&'p str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation(format!("Missing string param '{name}'")))
}
