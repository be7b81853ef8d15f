//! Tests for loading pipeline documents and mapping files from disk.

use spark_preprocessor::schema::{
    load_mapping_spec, load_pipeline_document, ExecutionTarget, PrefixScheme, SamplingMode,
};
use spark_preprocessor::ErrorKind;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const MAPPING: &str = r#"
entities:
  patients:
    table: catalog.schema.patients_raw
    columns:
      person_id: member_id
      date_of_birth: dob
references:
  icd10:
    table: catalog.reference.icd10
    columns:
      code: icd_code
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Pipeline documents
// ============================================================================

#[test]
fn test_load_full_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "pipeline.yaml",
        &format!(
            "mapping:\n{}\npipeline:\n  name: p\n  slug: p_slug\n  version: v1\n  execution_target: databricks\n  spine:\n    entity: patients\n    columns: [person_id]\n  output:\n    table: c.s.t\n  naming:\n    prefixing:\n      scheme: feature\nfeatures:\n  - key: age\n    params:\n      start: date_of_birth\n      end: as_of_date\nprofiling:\n  enabled: true\n  sampling_mode: deterministic\n",
            MAPPING
                .lines()
                .map(|line| format!("  {line}"))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    );

    let document = load_pipeline_document(&path).unwrap();
    assert_eq!(document.pipeline.slug(), "p_slug");
    assert_eq!(document.pipeline.execution_target, ExecutionTarget::Databricks);
    assert_eq!(document.pipeline.naming.prefixing.scheme, PrefixScheme::Feature);
    assert_eq!(document.features[0].key, "age");
    assert_eq!(document.features[0].params["end"], "as_of_date");
    assert_eq!(
        document.profiling.unwrap().sampling_mode,
        SamplingMode::Deterministic
    );
    assert_eq!(
        document.mapping.entity_table("icd10").unwrap(),
        "catalog.reference.icd10"
    );
}

#[test]
fn test_missing_pipeline_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_pipeline_document(&dir.path().join("missing.yaml")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Pipeline file not found"));
}

#[test]
fn test_pipeline_must_be_a_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "pipeline.yaml", "- just\n- a list\n");
    let err = load_pipeline_document(&path).unwrap_err();
    assert!(err.to_string().contains("must be a mapping at the top level"));
}

#[test]
fn test_pipeline_rejects_unknown_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "pipeline.yaml",
        "mapping:\n  entities: {}\npipeline:\n  name: p\n  version: v1\n  colour: blue\n  spine:\n    entity: patients\n    columns: [person_id]\n  output:\n    table: t\n",
    );
    let err = load_pipeline_document(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Pipeline YAML failed validation"));
}

// ============================================================================
// Mapping files
// ============================================================================

#[test]
fn test_load_bare_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "mapping.yaml", MAPPING);

    let mapping = load_mapping_spec(&path).unwrap();
    assert!(mapping.has_entity("patients"));
    assert!(mapping.references.contains_key("icd10"));
    assert!(mapping.has_column("patients", "date_of_birth"));
}

#[test]
fn test_load_mapping_nested_under_mapping_key() {
    let dir = tempfile::tempdir().unwrap();
    let nested: String = MAPPING
        .lines()
        .map(|line| format!("  {line}\n"))
        .collect();
    let path = write(&dir, "mapping.yaml", &format!("mapping:\n{nested}"));

    let mapping = load_mapping_spec(&path).unwrap();
    assert_eq!(
        mapping.entity_columns("patients").unwrap()["person_id"],
        "member_id"
    );
}

#[test]
fn test_missing_mapping_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_mapping_spec(&dir.path().join("missing.yaml")).unwrap_err();
    assert!(err.to_string().contains("Mapping file not found"));
}

#[test]
fn test_mapping_requires_entities() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "mapping.yaml", "references: {}\n");
    let err = load_mapping_spec(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Mapping YAML failed validation"));
}
