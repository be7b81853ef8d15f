//! Output directory layout and destructive project writes.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::CompileOutput;
use crate::error::{Error, Result};
use crate::naming::{feature_slug, last_segment, validate_identifier_part, ModelNamer};
use crate::sqlmesh::render_model;

/// Directories every generated project contains.
pub const PROJECT_DIRS: [&str; 7] = [
    "models/semantic",
    "models/features",
    "models/marts",
    "tests",
    "notebooks",
    "rendered",
    "manifest",
];

pub const COMPILE_REPORT_PATH: &str = "manifest/compile_report.json";
pub const SQLMESH_CONFIG_PATH: &str = "sqlmesh.yaml";

/// One generated file, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFile {
    pub path: PathBuf,
    pub contents: String,
}

impl ProjectFile {
    fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

pub fn mart_path(pipeline_name: &str) -> PathBuf {
    Path::new("models/marts").join(format!("enriched__{pipeline_name}.sql"))
}

pub fn rendered_path(pipeline_name: &str) -> PathBuf {
    Path::new("rendered").join(format!("enriched__{pipeline_name}.sql"))
}

pub fn notebook_path(pipeline_name: &str) -> PathBuf {
    Path::new("notebooks").join(format!("profile__{pipeline_name}.py"))
}

/// Lay out every artifact of a compile as project files.
///
/// Names that become path components must be plain identifiers, so no file
/// lands outside the project root.
pub(crate) fn project_files(
    output: &CompileOutput,
    models: &dyn ModelNamer,
) -> Result<Vec<ProjectFile>> {
    let pipeline_name = output.report.pipeline_name();
    validate_identifier_part(pipeline_name, "pipeline name")?;
    let mut files = Vec::new();

    for model in &output.semantic_models {
        let path = Path::new("models/semantic").join(format!("{}.sql", last_segment(&model.name)));
        files.push(ProjectFile::new(path, render_model(model)));
    }

    for feature in &output.features {
        feature_slug(&feature.key)?;
        let feature_dir = Path::new("models/features").join(&feature.key);
        for model in &feature.assets.models {
            let stem = models.model_file_stem(&model.name);
            validate_identifier_part(&stem, "model file name")?;
            files.push(ProjectFile::new(
                feature_dir.join(format!("{stem}.sql")),
                render_model(model),
            ));
        }
    }

    files.push(ProjectFile::new(
        mart_path(pipeline_name),
        render_model(&output.final_model),
    ));

    for feature in &output.features {
        for test in &feature.assets.tests {
            validate_identifier_part(&test.name, "test name")?;
            files.push(ProjectFile::new(
                Path::new("tests").join(format!("{}.yaml", test.name)),
                test.yaml.clone(),
            ));
        }
    }

    files.push(ProjectFile::new(
        rendered_path(pipeline_name),
        output.rendered_sql.clone(),
    ));
    files.push(ProjectFile::new(
        COMPILE_REPORT_PATH,
        output.report.to_json_pretty()?,
    ));
    if let Some(notebook) = &output.profiling_notebook {
        files.push(ProjectFile::new(notebook_path(pipeline_name), notebook.clone()));
    }
    files.push(ProjectFile::new(
        SQLMESH_CONFIG_PATH,
        output.sqlmesh_config.clone(),
    ));

    Ok(files)
}

fn wipe_out_dir(out_dir: &Path) -> Result<()> {
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
    }
    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))
}

/// Replace `out_dir` with the project for `output`.
///
/// Existing contents are deleted first, so concurrent writes to the same
/// directory must be serialized by the caller.
pub fn write_project(out_dir: &Path, output: &CompileOutput) -> Result<()> {
    wipe_out_dir(out_dir)?;
    for dir in PROJECT_DIRS {
        let path = out_dir.join(dir);
        fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
    }

    for file in &output.files {
        let path = out_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, &file.contents).map_err(|e| Error::io(&path, e))?;
    }

    info!(
        out_dir = %out_dir.display(),
        files = output.files.len(),
        "wrote project"
    );
    Ok(())
}
