//! The compile report written to `manifest/compile_report.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::schema::PipelineDocument;

/// Machine-readable summary of one compile, written to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileReport {
    compiled_at: String,
    /// Built features in selection order.
    included_features: Vec<String>,
    output_table: String,
    pipeline_name: String,
    pipeline_version: String,
    /// Profiling config snapshot; an empty object when absent.
    profiling: serde_json::Value,
    /// Entity name, or `reference.<name>`, to physical table.
    resolved_tables: BTreeMap<String, String>,
    skipped_features: BTreeMap<String, String>,
}

impl CompileReport {
    pub fn new(
        document: &PipelineDocument,
        included_features: Vec<String>,
        skipped_features: BTreeMap<String, String>,
        compiled_at: &str,
    ) -> Result<Self> {
        let mapping = &document.mapping;
        let resolved_tables = mapping
            .entities
            .iter()
            .map(|(entity, m)| (entity.clone(), m.table.clone()))
            .chain(
                mapping
                    .references
                    .iter()
                    .map(|(name, m)| (format!("reference.{name}"), m.table.clone())),
            )
            .collect();

        let profiling = match &document.profiling {
            Some(profiling) => serde_json::to_value(profiling)?,
            None => serde_json::Value::Object(serde_json::Map::new()),
        };

        Ok(Self {
            compiled_at: compiled_at.to_string(),
            included_features,
            output_table: document.pipeline.output.table.clone(),
            pipeline_name: document.pipeline.name.clone(),
            pipeline_version: document.pipeline.version.clone(),
            profiling,
            resolved_tables,
            skipped_features,
        })
    }

    pub fn compiled_at(&self) -> &str {
        &self.compiled_at
    }

    /// Built features in selection order.
    pub fn included_features(&self) -> &[String] {
        &self.included_features
    }

    pub fn output_table(&self) -> &str {
        &self.output_table
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn pipeline_version(&self) -> &str {
        &self.pipeline_version
    }

    pub fn profiling(&self) -> &serde_json::Value {
        &self.profiling
    }

    pub fn resolved_tables(&self) -> &BTreeMap<String, String> {
        &self.resolved_tables
    }

    /// Feature key to skip reason.
    pub fn skipped_features(&self) -> &BTreeMap<String, String> {
        &self.skipped_features
    }

    /// Pretty JSON with keys sorted at every level.
    pub fn to_json_pretty(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
