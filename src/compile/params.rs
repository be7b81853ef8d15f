//! Parameter and requirement validation for selected features.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::features::{BuildContext, FeatureMetadata, FeatureRequirement, ParamSpec, ParamType, Params};
use crate::schema::MappingSpec;

/// Resolve raw params against a feature's declared param specs.
///
/// Defaults fill absent values; absent optional params are left out.
pub fn validate_params(metadata: &FeatureMetadata, raw: &Params) -> Result<Params> {
    let unexpected: Vec<&str> = raw
        .keys()
        .filter(|name| !metadata.params.iter().any(|spec| &spec.name == *name))
        .map(String::as_str)
        .collect();
    if !unexpected.is_empty() {
        return Err(Error::validation(format!(
            "Feature '{}' has unexpected params: {unexpected:?}",
            metadata.key
        )));
    }

    let mut params = Params::new();
    for spec in &metadata.params {
        let value = raw
            .get(&spec.name)
            .filter(|value| !value.is_null())
            .or(spec.default.as_ref());
        let Some(value) = value else {
            if spec.required {
                return Err(Error::validation(format!(
                    "Feature '{}' missing required param '{}'",
                    metadata.key, spec.name
                )));
            }
            continue;
        };
        check_param_type(&metadata.key, spec, value)?;
        params.insert(spec.name.clone(), value.clone());
    }
    Ok(params)
}

/// Check one value against its declared type.
pub fn check_param_type(feature_key: &str, spec: &ParamSpec, value: &Value) -> Result<()> {
    let expected = match spec.param_type {
        ParamType::Int if !(value.is_i64() || value.is_u64()) => Some("int"),
        ParamType::Float if !value.is_number() => Some("float"),
        ParamType::Bool if !value.is_boolean() => Some("bool"),
        ParamType::Str | ParamType::Date | ParamType::ColumnRef | ParamType::Enum
            if !value.is_string() =>
        {
            Some("str")
        }
        _ => None,
    };
    if let Some(expected) = expected {
        return Err(Error::validation(format!(
            "Feature '{feature_key}' param '{}' must be {expected}",
            spec.name
        )));
    }

    if spec.param_type == ParamType::Enum {
        if let (Some(allowed), Some(value)) = (&spec.enum_values, value.as_str()) {
            if !allowed.is_empty() && !allowed.iter().any(|v| v == value) {
                return Err(Error::validation(format!(
                    "Feature '{feature_key}' param '{}' must be one of {allowed:?}",
                    spec.name
                )));
            }
        }
    }
    Ok(())
}

/// Required `entity.column` pairs that are not mapped.
pub fn check_requirements(
    requirements: &[FeatureRequirement],
    mapping: &MappingSpec,
) -> BTreeSet<String> {
    requirements
        .iter()
        .flat_map(|req| {
            req.columns
                .iter()
                .filter(|column| !mapping.has_column(&req.entity, column))
                .map(move |column| format!("{}.{column}", req.entity))
        })
        .collect()
}

/// Column-ref params that point off the spine or at unmapped columns.
pub fn check_column_refs(
    metadata: &FeatureMetadata,
    params: &Params,
    ctx: &BuildContext<'_>,
) -> BTreeSet<String> {
    let mut missing = BTreeSet::new();
    for spec in &metadata.params {
        if spec.param_type != ParamType::ColumnRef {
            continue;
        }
        let Some(raw) = params.get(&spec.name).and_then(Value::as_str) else {
            continue;
        };
        let column_ref = ctx.resolve_column_ref(raw);
        // Cross-entity refs are not joinable yet, so they count as missing.
        if column_ref.entity != ctx.spine_entity
            || !ctx.mapping.has_column(&column_ref.entity, &column_ref.column)
        {
            missing.insert(column_ref.to_string());
        }
    }
    missing
}
