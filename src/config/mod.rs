//! Tool configuration for the pipeline compiler.
//!
//! Handles the optional settings file and environment variable expansion.
//! Pipeline documents themselves live in [`crate::schema`].

mod settings;

pub use settings::{
    expand_env_vars, DatabricksSettings, ProfilingSettings, Settings, SettingsError,
    SqlmeshSettings,
};
