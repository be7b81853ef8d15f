//! SQLMesh project artifacts: model files and `sqlmesh.yaml`.

use serde::Serialize;

use crate::config::SqlmeshSettings;
use crate::error::Result;
use crate::features::{ModelKind, ModelSpec};

/// Minimal SQLMesh project configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlmeshConfig {
    pub engine_type: String,
    pub dialect: String,
}

impl Default for SqlmeshConfig {
    fn default() -> Self {
        Self::from(&SqlmeshSettings::default())
    }
}

impl From<&SqlmeshSettings> for SqlmeshConfig {
    fn from(settings: &SqlmeshSettings) -> Self {
        Self {
            engine_type: settings.engine.clone(),
            dialect: settings.dialect.clone(),
        }
    }
}

#[derive(Serialize)]
struct ConfigFile<'a> {
    model_defaults: ModelDefaults<'a>,
    engine: Engine<'a>,
}

#[derive(Serialize)]
struct ModelDefaults<'a> {
    dialect: &'a str,
}

#[derive(Serialize)]
struct Engine<'a> {
    #[serde(rename = "type")]
    engine_type: &'a str,
}

/// SQLMesh `kind` keyword for a model kind. Tables are full refreshes.
pub fn model_kind_keyword(kind: ModelKind) -> &'static str {
    match kind {
        ModelKind::Table => "FULL",
        ModelKind::View => "VIEW",
    }
}

/// Render a model file: the `MODEL (...)` header followed by the query.
pub fn render_model(spec: &ModelSpec) -> String {
    let mut header_items = vec![
        format!("name {}", spec.name),
        format!("kind {}", model_kind_keyword(spec.kind)),
    ];
    if !spec.tags.is_empty() {
        header_items.push(format!("tags [{}]", spec.tags.join(", ")));
    }
    format!(
        "MODEL (\n  {}\n)\n\n{}\n",
        header_items.join(",\n  "),
        spec.sql.trim()
    )
}

pub fn render_config(config: &SqlmeshConfig) -> Result<String> {
    let file = ConfigFile {
        model_defaults: ModelDefaults {
            dialect: &config.dialect,
        },
        engine: Engine {
            engine_type: &config.engine_type,
        },
    };
    Ok(serde_yaml::to_string(&file)?)
}
