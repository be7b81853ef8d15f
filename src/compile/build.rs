//! Builds selected features in order, enforcing the skip/fail policy.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::expr::{expression_references, parse_select_expressions, SelectExpression};
use super::params::{check_column_refs, check_requirements, validate_params};
use crate::error::{Error, Result};
use crate::features::{BuildContext, FeatureAssets, FeatureMetadata, FeatureRegistry};
use crate::schema::{FeatureConfig, MissingColumnPolicy};

const MISSING_COLUMNS: &str = "missing columns";
const MISSING_DEPENDENCIES: &str = "missing dependent feature outputs";
const INCOMPATIBLE_GRAIN: &str = "incompatible with pipeline grain";

/// A feature that passed validation and built successfully.
#[derive(Debug, Clone)]
pub struct BuiltFeature {
    pub key: String,
    pub metadata: FeatureMetadata,
    pub assets: FeatureAssets,
    pub select_expressions: Vec<SelectExpression>,
}

/// Outcome of building a feature selection.
#[derive(Debug, Clone, Default)]
pub struct FeatureBuild {
    /// In selection order.
    pub built: Vec<BuiltFeature>,
    /// Feature key to skip reason.
    pub skipped: BTreeMap<String, String>,
}

impl FeatureBuild {
    pub fn included_keys(&self) -> Vec<String> {
        self.built.iter().map(|feature| feature.key.clone()).collect()
    }

    pub fn select_expressions(&self) -> Vec<SelectExpression> {
        self.built
            .iter()
            .flat_map(|feature| feature.select_expressions.iter().cloned())
            .collect()
    }
}

/// Returns the skip reason under `warn_skip`, the error under `fail`.
fn skip_or_fail(
    policy: MissingColumnPolicy,
    reason: &'static str,
    error: impl FnOnce() -> String,
) -> Result<&'static str> {
    match policy {
        MissingColumnPolicy::WarnSkip => Ok(reason),
        MissingColumnPolicy::Fail => Err(Error::validation(error())),
    }
}

/// Aliases referenced by `expressions` that are provided by some selected
/// feature but are not yet available.
fn missing_dependencies(
    expressions: &[SelectExpression],
    available: &BTreeSet<String>,
    known_outputs: &BTreeSet<String>,
) -> Result<BTreeSet<String>> {
    let mut unmet = BTreeSet::new();
    for expr in expressions {
        let candidates = known_outputs
            .iter()
            .map(String::as_str)
            .filter(|name| *name != expr.alias);
        unmet.extend(
            expression_references(&expr.expression, candidates)?
                .into_iter()
                .filter(|name| !available.contains(name)),
        );
    }
    Ok(unmet)
}

/// Build every selected feature in selection order.
///
/// Unknown keys and alias-contract violations are always errors. Missing
/// columns, unmet dependencies and grain mismatches follow `policy`.
pub fn build_features(
    selections: &[FeatureConfig],
    registry: &FeatureRegistry,
    ctx: &BuildContext<'_>,
    policy: MissingColumnPolicy,
    spine_columns: &[String],
) -> Result<FeatureBuild> {
    let mut known_outputs = BTreeSet::new();
    for selection in selections {
        known_outputs.extend(registry.get(&selection.key)?.metadata().provided_names());
    }

    let mut available: BTreeSet<String> = spine_columns.iter().cloned().collect();
    let mut result = FeatureBuild::default();

    for selection in selections {
        let feature = registry.get(&selection.key)?;
        let metadata = feature.metadata();
        let key = metadata.key.as_str();

        if !metadata.supports_grain(&ctx.grain) {
            let reason = skip_or_fail(policy, INCOMPATIBLE_GRAIN, || {
                format!(
                    "Feature '{key}' is incompatible with pipeline grain '{}'",
                    ctx.grain
                )
            })?;
            warn!(feature = key, grain = %ctx.grain, reason, "skipping feature");
            result.skipped.insert(key.to_string(), reason.to_string());
            continue;
        }

        let params = validate_params(metadata, &selection.params)?;
        let mut missing = check_requirements(&metadata.requirements, ctx.mapping);
        missing.extend(check_column_refs(metadata, &params, ctx));
        if !missing.is_empty() {
            let reason = skip_or_fail(policy, MISSING_COLUMNS, || {
                format!("Feature '{key}' has {MISSING_COLUMNS}: {missing:?}")
            })?;
            warn!(feature = key, ?missing, reason, "skipping feature");
            result.skipped.insert(key.to_string(), reason.to_string());
            continue;
        }

        let assets = feature.build(ctx, &params)?;
        let select_expressions = parse_select_expressions(&assets.select_expressions, key)?;

        let aliases: BTreeSet<String> = select_expressions
            .iter()
            .map(|expr| expr.alias.clone())
            .collect();
        let provided = metadata.provided_names();
        if aliases != provided {
            return Err(Error::validation(format!(
                "Feature '{key}' select aliases do not match provides: {aliases:?} != {provided:?}"
            )));
        }

        let unmet = missing_dependencies(&select_expressions, &available, &known_outputs)?;
        if !unmet.is_empty() {
            let reason = skip_or_fail(policy, MISSING_DEPENDENCIES, || {
                format!("Feature '{key}' has {MISSING_DEPENDENCIES}: {unmet:?}")
            })?;
            warn!(feature = key, ?unmet, reason, "skipping feature");
            result.skipped.insert(key.to_string(), reason.to_string());
            continue;
        }

        debug!(
            feature = key,
            outputs = ?provided,
            models = assets.models.len(),
            joins = assets.join_models.len(),
            "built feature"
        );
        available.extend(provided);
        result.built.push(BuiltFeature {
            key: key.to_string(),
            metadata: metadata.clone(),
            assets,
            select_expressions,
        });
    }

    Ok(result)
}
