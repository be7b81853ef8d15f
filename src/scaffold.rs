//! Starter pipeline documents generated from a mapping file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::schema::{
    load_mapping_spec, CollisionPolicy, ExecutionTarget, MappingSpec, Materialization,
    NamingConfig, OutputConfig, PipelineDocument, PipelineMeta, PrefixScheme, PrefixingConfig,
    ProfilingConfig, SpineConfig, ValidationConfig, DEFAULT_SPINE_KEY, PERSON_GRAIN,
};

/// Default spine for a mapping: `(entity, key, columns)`.
///
/// Prefers `patients` and `person_id`, else the alphabetically first entity
/// and column.
pub fn default_spine(mapping: &MappingSpec) -> Result<(String, String, Vec<String>)> {
    let (entity, columns) = match mapping.entities.get_key_value("patients") {
        Some((name, entity)) => (name, &entity.columns),
        None => mapping
            .entities
            .iter()
            .next()
            .map(|(name, entity)| (name, &entity.columns))
            .ok_or_else(|| Error::configuration("Mapping must define at least one entity."))?,
    };

    let key = if columns.contains_key(DEFAULT_SPINE_KEY) {
        DEFAULT_SPINE_KEY.to_string()
    } else {
        columns.keys().next().cloned().ok_or_else(|| {
            Error::configuration(format!("Entity '{entity}' has no mapped columns."))
        })?
    };

    Ok((entity.clone(), key.clone(), vec![key]))
}

/// Template document around `mapping` with placeholder identity and no features.
pub fn scaffold_document(mapping: MappingSpec) -> Result<PipelineDocument> {
    let (entity, key, columns) = default_spine(&mapping)?;
    Ok(PipelineDocument {
        mapping,
        pipeline: PipelineMeta {
            name: "pipeline_name".to_string(),
            slug: None,
            version: "v0.1.0".to_string(),
            grain: PERSON_GRAIN.to_string(),
            execution_target: ExecutionTarget::Local,
            spine: SpineConfig {
                entity,
                key,
                columns,
            },
            output: OutputConfig {
                table: "catalog.schema.output_table".to_string(),
                materialization: Materialization::Table,
            },
            naming: NamingConfig {
                prefixing: PrefixingConfig {
                    scheme: PrefixScheme::Feature,
                    ..PrefixingConfig::default()
                },
                collision_policy: CollisionPolicy::Fail,
            },
            validation: ValidationConfig::default(),
        },
        features: Vec::new(),
        profiling: Some(ProfilingConfig::default()),
    })
}

/// Write `pipeline.yaml` for the mapping at `mapping_path` into `out_dir`.
pub fn scaffold_pipeline(mapping_path: &Path, out_dir: &Path) -> Result<PathBuf> {
    let mapping = load_mapping_spec(mapping_path)?;
    let document = scaffold_document(mapping)?;

    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    let pipeline_path = out_dir.join("pipeline.yaml");
    let yaml = serde_yaml::to_string(&document)?;
    fs::write(&pipeline_path, yaml).map_err(|e| Error::io(&pipeline_path, e))?;

    info!(path = %pipeline_path.display(), "scaffolded pipeline");
    Ok(pipeline_path)
}
