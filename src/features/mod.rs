//! Feature units and the registry that catalogs them.
//!
//! A feature declares [`FeatureMetadata`] (params, required columns, provided
//! outputs, compatible grains) and builds SQL fragments through [`Feature::build`].
//! Client-specific features live in their own modules and register alongside
//! the built-ins.

mod base;
mod builtins;
mod geisinger;
mod registry;

pub use base::{
    str_param, BuildContext, ColumnRef, ColumnSpec, Feature, FeatureAssets, FeatureMetadata,
    FeatureRequirement, JoinModelSpec, JoinType, ModelKind, ModelSpec, ParamSpec, ParamType,
    Params, TestSpec, SPINE_ALIAS,
};
pub use builtins::{register_builtins, AgeBucketFeature, AgeFeature};
pub use geisinger::{register_geisinger_features, Forward65FlagFeature};
pub use registry::FeatureRegistry;
