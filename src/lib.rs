//! # spark-preprocessor
//!
//! Compiles a declarative feature pipeline into a SQLMesh project plus one
//! enriched SQL statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Pipeline YAML (mapping, pipeline, features)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 PipelineDocument                         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile: validate, build features]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Built features + select expressions                 │
//! │      (params, requirements, dependency order)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile: resolve, render]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Semantic views, feature models, final statement,       │
//! │   compile report, profiling notebook                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Features plug in through the [`features::Feature`] trait and are looked
//! up in an explicit [`features::FeatureRegistry`].

pub mod compile;
pub mod config;
pub mod contract;
pub mod error;
pub mod features;
pub mod logging;
pub mod naming;
pub mod profiling;
pub mod scaffold;
pub mod schema;
pub mod sql;
pub mod sqlmesh;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{
        compile, compile_pipeline, write_project, CompileOptions, CompileOutput, CompileReport,
    };
    pub use crate::config::Settings;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::features::{
        BuildContext, ColumnSpec, Feature, FeatureAssets, FeatureMetadata, FeatureRegistry,
        FeatureRequirement, JoinModelSpec, JoinType, ModelSpec, ParamSpec, ParamType, Params,
    };
    pub use crate::schema::{load_pipeline_document, parse_pipeline_document, PipelineDocument};
}

pub use error::{Error, ErrorKind, Result};
