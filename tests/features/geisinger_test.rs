//! Tests for the Geisinger 65 Forward flag across execution targets.

use chrono::{TimeZone, Utc};
use spark_preprocessor::compile::{compile, CompileOptions, CompileOutput};
use spark_preprocessor::features::FeatureRegistry;
use spark_preprocessor::schema::{parse_pipeline_document, MissingColumnPolicy, PipelineDocument};
use spark_preprocessor::ErrorKind;
use std::path::Path;

const PIPELINE: &str = r#"
mapping:
  entities:
    patients:
      table: geisinger.raw.members
      columns:
        person_id: member_id
        pcp_name: pcp
  references:
    physicians_65_forward:
      table: geisinger.reference.physicians_65f
      columns:
        pcp_name: physician_name
        active65f: active_flag
pipeline:
  name: geisinger_enriched
  version: v2.0.0
  execution_target: local
  spine:
    entity: patients
    columns: [person_id]
  output:
    table: geisinger.ma_20260101.enriched_geisinger
features:
  - key: geisinger.forward_65_flag
"#;

fn document() -> PipelineDocument {
    parse_pipeline_document(PIPELINE).unwrap()
}

fn compile_document(document: &PipelineDocument) -> spark_preprocessor::Result<CompileOutput> {
    let options = CompileOptions::default()
        .with_compiled_at(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    compile(document, &FeatureRegistry::with_builtins().unwrap(), &options)
}

fn file<'a>(output: &'a CompileOutput, path: &str) -> &'a str {
    output
        .files
        .iter()
        .find(|file| file.path == Path::new(path))
        .map(|file| file.contents.as_str())
        .unwrap_or_else(|| panic!("missing {path}"))
}

// ============================================================================
// Local target
// ============================================================================

#[test]
fn test_local_flag_joins_feature_model() {
    let output = compile_document(&document()).unwrap();

    assert_eq!(
        output.report.included_features(),
        vec!["geisinger.forward_65_flag"]
    );
    let (_, body) = output
        .rendered_sql
        .split_once("-- features: geisinger.forward_65_flag\n")
        .unwrap();
    insta::assert_snapshot!(body, @r"
    SELECT
      p.person_id AS person_id,
      CASE WHEN f65.pcp_name IS NOT NULL THEN 'Y' ELSE 'N' END AS forward_65_flag
    FROM semantic.patients p
    LEFT JOIN features.geisinger__forward_65_flag__65_forward_pcp f65 ON COALESCE(p.pcp_name, '') = f65.pcp_name
    ");
}

#[test]
fn test_local_feature_model_file() {
    let output = compile_document(&document()).unwrap();
    let model = file(
        &output,
        "models/features/geisinger.forward_65_flag/features__geisinger__forward_65_flag__65_forward_pcp.sql",
    );
    insta::assert_snapshot!(model.trim_end(), @r"
    MODEL (
      name features.geisinger__forward_65_flag__65_forward_pcp,
      kind VIEW
    )

    SELECT DISTINCT pcp_name
    FROM semantic.reference__physicians_65_forward
    WHERE active65f = 1
      AND pcp_name IS NOT NULL
    ");
    file(&output, "models/semantic/reference__physicians_65_forward.sql");
}

// ============================================================================
// Databricks target
// ============================================================================

#[test]
fn test_databricks_names_use_pipeline_schemas() {
    let mut document = document();
    document.pipeline.execution_target = spark_preprocessor::schema::ExecutionTarget::Databricks;
    let output = compile_document(&document).unwrap();

    let model = file(
        &output,
        "models/features/geisinger.forward_65_flag/geisinger__forward_65_flag__65_forward_pcp.sql",
    );
    assert!(model.contains(
        "name geisinger.ma_20260101__geisinger_enriched_features.geisinger__forward_65_flag__65_forward_pcp,"
    ));
    assert!(model.contains(
        "FROM geisinger.ma_20260101__geisinger_enriched_semantic.reference__physicians_65_forward"
    ));
    assert!(output
        .rendered_sql
        .contains("FROM geisinger.ma_20260101__geisinger_enriched_semantic.patients p"));
    assert_eq!(
        output.semantic_models[0].name,
        "geisinger.ma_20260101__geisinger_enriched_semantic.patients"
    );
}

#[test]
fn test_databricks_requires_three_part_output() {
    let mut document = document();
    document.pipeline.execution_target = spark_preprocessor::schema::ExecutionTarget::Databricks;
    document.pipeline.output.table = "enriched_geisinger".to_string();

    let err = compile_document(&document).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

// ============================================================================
// Missing inputs
// ============================================================================

#[test]
fn test_missing_reference_is_skipped_under_warn_skip() {
    let mut document = document();
    document.mapping.references.clear();
    document.pipeline.validation.on_missing_required_column = MissingColumnPolicy::WarnSkip;

    let output = compile_document(&document).unwrap();
    assert!(output.report.included_features().is_empty());
    assert_eq!(
        output.report.skipped_features()["geisinger.forward_65_flag"],
        "missing columns"
    );
    assert!(!output.rendered_sql.contains("JOIN"));
}

#[test]
fn test_missing_pcp_name_fails() {
    let mut document = document();
    document
        .mapping
        .entities
        .get_mut("patients")
        .unwrap()
        .columns
        .remove("pcp_name");

    let err = compile_document(&document).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("patients.pcp_name"));
}
