//! Error types shared by every stage of pipeline compilation.
//!
//! All failures surface as [`Error`], so the CLI boundary can catch exactly
//! this family and report it cleanly.

use std::path::PathBuf;

/// Result type for pipeline compilation.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    FeatureNotFound,
    Compile,
    Io,
}

/// Errors that can occur while loading, validating, or compiling a pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing input document, unknown mapped entity or column.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parameter, requirement, collision, or dependency violation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A feature key was not found in the registry.
    #[error("Unknown feature key: {0}")]
    FeatureNotFound(String),

    /// Compilation could not complete.
    #[error("Compile error: {0}")]
    Compile(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Validation(_) => ErrorKind::Validation,
            Error::FeatureNotFound(_) => ErrorKind::FeatureNotFound,
            Error::Compile(_) | Error::Json(_) | Error::Yaml(_) => ErrorKind::Compile,
            Error::Io { .. } => ErrorKind::Io,
        }
    }
}

impl From<crate::config::SettingsError> for Error {
    fn from(err: crate::config::SettingsError) -> Self {
        Error::Configuration(err.to_string())
    }
}
