//! YAML loaders for pipeline documents and mapping files.

use std::fs;
use std::path::Path;

use serde_yaml::Value;

use super::{MappingSpec, PipelineDocument};
use crate::error::{Error, Result};

/// Load a pipeline document from YAML.
///
/// # Errors
///
/// `Error::Configuration` if the file is missing, is not a mapping at the top
/// level, or does not match the document schema.
pub fn load_pipeline_document(path: &Path) -> Result<PipelineDocument> {
    if !path.exists() {
        return Err(Error::configuration(format!(
            "Pipeline file not found: {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_pipeline_document(&content)
}

/// Parse a pipeline document from YAML text.
pub fn parse_pipeline_document(content: &str) -> Result<PipelineDocument> {
    let data = read_top_level_mapping(content, "Pipeline")?;
    serde_yaml::from_value(data)
        .map_err(|e| Error::configuration(format!("Pipeline YAML failed validation: {e}")))
}

/// Load a mapping specification from YAML.
///
/// Accepts either a bare mapping (`entities:` at the top level) or a full
/// pipeline document, in which case only its `mapping:` section is read.
pub fn load_mapping_spec(path: &Path) -> Result<MappingSpec> {
    if !path.exists() {
        return Err(Error::configuration(format!(
            "Mapping file not found: {}",
            path.display()
        )));
    }
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let mut data = read_top_level_mapping(&content, "Mapping")?;
    if let Some(inner) = data.get("mapping") {
        data = inner.clone();
    }
    serde_yaml::from_value(data)
        .map_err(|e| Error::configuration(format!("Mapping YAML failed validation: {e}")))
}

fn read_top_level_mapping(content: &str, label: &str) -> Result<Value> {
    let data: Value = serde_yaml::from_str(content)
        .map_err(|e| Error::configuration(format!("{label} YAML could not be parsed: {e}")))?;
    if !data.is_mapping() {
        return Err(Error::configuration(format!(
            "{label} YAML must be a mapping at the top level"
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_scalar_document() {
        let err = parse_pipeline_document("nope").unwrap_err();
        assert!(err.to_string().contains("must be a mapping at the top level"));
    }

    #[test]
    fn test_parse_rejects_empty_document() {
        let err = parse_pipeline_document("").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_parse_wraps_schema_errors() {
        let err = parse_pipeline_document(
            "mapping:\n  entities:\n    patients:\n      table: t\n      columns: {}\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("Pipeline YAML failed validation"));
    }
}
