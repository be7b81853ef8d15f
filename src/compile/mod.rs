//! End-to-end compilation from a pipeline document to a SQLMesh project.
//!
//! ```text
//! Document → Validate → Build features → Resolve aliases → Render SQL → Write
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spark_preprocessor::compile::{compile_pipeline, CompileOptions};
//! use spark_preprocessor::features::FeatureRegistry;
//!
//! let registry = FeatureRegistry::with_builtins()?;
//! let output = compile_pipeline(
//!     "pipeline.yaml".as_ref(),
//!     "out".as_ref(),
//!     &registry,
//!     &CompileOptions::default(),
//! )?;
//! println!("{}", output.rendered_sql);
//! ```

mod build;
pub mod expr;
pub mod params;
mod render;
mod report;
pub mod resolve;
mod validate;
mod writer;

pub use build::{build_features, BuiltFeature, FeatureBuild};
pub use expr::SelectExpression;
pub use render::{
    prepend_header, render_final_sql, render_join_clause, render_select_statement,
    render_semantic_sql, render_with_layers, StatementHeader,
};
pub use report::CompileReport;
pub use resolve::{resolve_select_expressions, ResolvedExpressions};
pub use validate::validate_pipeline;
pub use writer::{
    mart_path, notebook_path, rendered_path, write_project, ProjectFile, COMPILE_REPORT_PATH,
    PROJECT_DIRS, SQLMESH_CONFIG_PATH,
};

use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

use crate::config::Settings;
use crate::contract::SemanticContract;
use crate::error::Result;
use crate::features::{BuildContext, FeatureRegistry, JoinModelSpec, ModelSpec};
use crate::naming::{namer_for, ModelNamer};
use crate::profiling::render_profiling_notebook;
use crate::schema::{load_pipeline_document, MappingSpec, Materialization, PipelineDocument};
use crate::sqlmesh::{render_config, SqlmeshConfig};

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Tool settings (SQLMesh target, Databricks suffixes, profiling root).
    pub settings: Settings,

    /// Fixed compile timestamp; defaults to the current time.
    pub compiled_at: Option<DateTime<Utc>>,
}

impl CompileOptions {
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_compiled_at(mut self, compiled_at: DateTime<Utc>) -> Self {
        self.compiled_at = Some(compiled_at);
        self
    }

    fn timestamp(&self) -> String {
        self.compiled_at.unwrap_or_else(Utc::now).to_rfc3339()
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Everything one compile produces, held in memory until written.
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub semantic_models: Vec<ModelSpec>,
    pub features: Vec<BuiltFeature>,
    pub final_model: ModelSpec,
    /// Final statement including its metadata header.
    pub rendered_sql: String,
    pub profiling_notebook: Option<String>,
    pub sqlmesh_config: String,
    pub report: CompileReport,
    /// Project files relative to the output directory.
    pub files: Vec<ProjectFile>,
}

// ============================================================================
// Compilation Functions
// ============================================================================

/// Semantic views for every mapped entity, then every reference, sorted by name.
pub fn build_semantic_models(
    mapping: &MappingSpec,
    models: &dyn ModelNamer,
) -> Result<Vec<ModelSpec>> {
    let mut specs = Vec::with_capacity(mapping.entities.len() + mapping.references.len());
    for (name, entity) in &mapping.entities {
        specs.push(ModelSpec::view(
            models.semantic_entity_model(name)?,
            render_semantic_sql(&entity.table, &entity.columns),
        ));
    }
    for (name, reference) in &mapping.references {
        specs.push(ModelSpec::view(
            models.semantic_reference_model(name)?,
            render_semantic_sql(&reference.table, &reference.columns),
        ));
    }
    Ok(specs)
}

/// Compile a document in memory. No files are touched.
pub fn compile(
    document: &PipelineDocument,
    registry: &FeatureRegistry,
    options: &CompileOptions,
) -> Result<CompileOutput> {
    let compiled_at = options.timestamp();
    let pipeline = &document.pipeline;
    let contract = SemanticContract::default();

    validate_pipeline(document, &contract)?;
    info!(pipeline = %pipeline.name, "validated pipeline");

    let namer = namer_for(pipeline, &options.settings.databricks)?;
    let ctx = BuildContext::from_document(document, &contract, namer.as_ref());

    let semantic_models = build_semantic_models(&document.mapping, namer.as_ref())?;

    let build = build_features(
        &document.features,
        registry,
        &ctx,
        pipeline.validation.on_missing_required_column,
        &pipeline.spine.columns,
    )?;
    info!(
        included = build.built.len(),
        skipped = build.skipped.len(),
        "built features"
    );

    let resolved = resolve_select_expressions(
        &build.select_expressions(),
        &pipeline.naming,
        &pipeline.spine.columns,
    )?;

    let joins: Vec<&JoinModelSpec> = build
        .built
        .iter()
        .flat_map(|feature| &feature.assets.join_models)
        .collect();
    let spine_model = ctx.semantic_entity_model_name(&ctx.spine_entity)?;
    let body = render_final_sql(
        &spine_model,
        &ctx.spine_alias,
        &pipeline.spine.columns,
        &resolved,
        &joins,
    );

    let included = build.included_keys();
    let rendered_sql = prepend_header(
        &StatementHeader {
            pipeline_name: &pipeline.name,
            pipeline_version: &pipeline.version,
            compiled_at: &compiled_at,
            feature_keys: &included,
        },
        &body,
    );
    info!(
        derived_layers = resolved.derived_layers.len(),
        joins = joins.len(),
        "rendered final statement"
    );

    let final_model = match pipeline.output.materialization {
        Materialization::Table => ModelSpec::table(&pipeline.output.table, &rendered_sql),
        Materialization::View => ModelSpec::view(&pipeline.output.table, &rendered_sql),
    };

    let notebook =
        render_profiling_notebook(document, namer.as_ref(), &options.settings.profiling)?;
    let sqlmesh_config = render_config(&SqlmeshConfig::from(&options.settings.sqlmesh))?;
    let report = CompileReport::new(document, included, build.skipped, &compiled_at)?;

    let mut output = CompileOutput {
        semantic_models,
        features: build.built,
        final_model,
        rendered_sql,
        profiling_notebook: (!notebook.is_empty()).then_some(notebook),
        sqlmesh_config,
        report,
        files: Vec::new(),
    };
    output.files = writer::project_files(&output, namer.as_ref())?;
    Ok(output)
}

/// Load, compile and write a pipeline into `out_dir`.
///
/// The output directory is only wiped once compilation has succeeded.
pub fn compile_pipeline(
    pipeline_path: &Path,
    out_dir: &Path,
    registry: &FeatureRegistry,
    options: &CompileOptions,
) -> Result<CompileOutput> {
    let document = load_pipeline_document(pipeline_path)?;
    let output = compile(&document, registry, options)?;
    write_project(out_dir, &output)?;
    info!(
        pipeline = %output.report.pipeline_name(),
        version = %output.report.pipeline_version(),
        output_table = %output.report.output_table(),
        "compile_complete"
    );
    Ok(output)
}
