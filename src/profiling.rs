//! Databricks profiling notebook generation.

use crate::config::ProfilingSettings;
use crate::error::Result;
use crate::naming::ModelNamer;
use crate::schema::{PipelineDocument, SamplingMode};

const CELL: &str = "# COMMAND ----------";

/// Render a notebook that profiles sampled semantic entities and the output.
///
/// Returns an empty string when profiling is absent or disabled.
pub fn render_profiling_notebook(
    document: &PipelineDocument,
    models: &dyn ModelNamer,
    settings: &ProfilingSettings,
) -> Result<String> {
    let Some(profiling) = document.profiling.as_ref().filter(|p| p.enabled) else {
        return Ok(String::new());
    };

    let output_dir = profiling.output_dir.clone().unwrap_or_else(|| {
        format!(
            "{}/{}",
            settings.output_root.trim_end_matches('/'),
            document.pipeline.name
        )
    });

    let mut lines: Vec<String> = vec![
        "# Databricks notebook source".into(),
        CELL.into(),
        "import pyspark.sql.functions as F".into(),
        "from ydata_profiling import ProfileReport".into(),
        CELL.into(),
        format!("output_dir = '{output_dir}'"),
        format!("sample_rows = {}", profiling.sample_rows),
        format!("sampling_mode = '{}'", profiling.sampling_mode.as_str()),
        format!("sampling_seed = {}", profiling.sampling_seed),
        "dbutils.fs.mkdirs(output_dir)".into(),
        CELL.into(),
        "def sample_table(table_name):".into(),
        "    df = spark.table(table_name)".into(),
    ];
    lines.push(match profiling.sampling_mode {
        SamplingMode::Random => "    df = df.orderBy(F.rand())".into(),
        SamplingMode::Deterministic => {
            "    df = df.orderBy(F.xxhash64(*[F.col(c) for c in df.columns], F.lit(sampling_seed)))"
                .into()
        }
    });
    lines.push("    return df.limit(sample_rows)".into());

    let mut add_block = |table_name: &str, title: &str| {
        let safe_name = table_name.replace('.', "_");
        lines.push(CELL.into());
        lines.push(format!("df = sample_table('{table_name}')"));
        lines.push(format!("report = ProfileReport(df.toPandas(), title='{title}')"));
        lines.push(format!("report.to_file(f'{{output_dir}}/{safe_name}.html')"));
        lines.push("displayHTML(report.to_html())".into());
    };

    for entity in &profiling.profile_raw_entities {
        let model = models.semantic_entity_model(entity)?;
        add_block(&model, &format!("{entity} (semantic)"));
    }
    if profiling.profile_output {
        add_block(&document.pipeline.output.table, "enriched output");
    }

    let mut text = lines.join("\n");
    text.push('\n');
    Ok(text)
}
