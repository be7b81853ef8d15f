//! TOML-based tool settings.
//!
//! Supports a config file (spark-preprocessor.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [sqlmesh]
//! engine = "databricks"
//! dialect = "spark"
//!
//! [databricks]
//! semantic_schema_suffix = "_semantic"
//! features_schema_suffix = "_features"
//!
//! [profiling]
//! output_root = "${PROFILE_ROOT}"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit settings file.
pub const CONFIG_ENV_VAR: &str = "SPARK_PREPROCESSOR_CONFIG";

/// Settings file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "spark-preprocessor.toml";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// SQLMesh project defaults written to `sqlmesh.yaml`.
    pub sqlmesh: SqlmeshSettings,

    /// Schema naming for the databricks execution target.
    pub databricks: DatabricksSettings,

    /// Profiling notebook defaults.
    pub profiling: ProfilingSettings,
}

/// SQLMesh project configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlmeshSettings {
    /// Engine type (e.g. databricks, duckdb).
    pub engine: String,

    /// SQL dialect for model defaults.
    pub dialect: String,
}

impl Default for SqlmeshSettings {
    fn default() -> Self {
        Self {
            engine: "databricks".to_string(),
            dialect: "spark".to_string(),
        }
    }
}

/// Databricks namespace configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabricksSettings {
    /// Appended to `<schema>__<slug>` for semantic views.
    pub semantic_schema_suffix: String,

    /// Appended to `<schema>__<slug>` for feature models.
    pub features_schema_suffix: String,
}

impl Default for DatabricksSettings {
    fn default() -> Self {
        Self {
            semantic_schema_suffix: "_semantic".to_string(),
            features_schema_suffix: "_features".to_string(),
        }
    }
}

/// Profiling defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilingSettings {
    /// Root directory for profile reports when a pipeline sets no `output_dir`.
    pub output_root: String,
}

impl Default for ProfilingSettings {
    fn default() -> Self {
        Self {
            output_root: "dbfs:/FileStore/profiles".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// String values are expanded with [`expand_env_vars`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.resolved()
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SPARK_PREPROCESSOR_CONFIG`
    /// 2. `./spark-preprocessor.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV_VAR) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        Ok(Settings::default())
    }

    fn resolved(self) -> Result<Self, SettingsError> {
        let settings = Settings {
            sqlmesh: SqlmeshSettings {
                engine: expand_env_vars(&self.sqlmesh.engine)?,
                dialect: expand_env_vars(&self.sqlmesh.dialect)?,
            },
            databricks: DatabricksSettings {
                semantic_schema_suffix: expand_env_vars(&self.databricks.semantic_schema_suffix)?,
                features_schema_suffix: expand_env_vars(&self.databricks.features_schema_suffix)?,
            },
            profiling: ProfilingSettings {
                output_root: expand_env_vars(&self.profiling.output_root)?,
            },
        };

        if settings.sqlmesh.engine.is_empty() || settings.sqlmesh.dialect.is_empty() {
            return Err(SettingsError::InvalidConfig(
                "sqlmesh engine and dialect must be non-empty".to_string(),
            ));
        }
        Ok(settings)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // lone $
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
