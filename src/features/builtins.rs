//! Built-in demographic features.

use super::{
    str_param, BuildContext, ColumnSpec, Feature, FeatureAssets, FeatureMetadata, FeatureRegistry,
    ParamSpec, ParamType, Params,
};
use crate::error::Result;
use crate::schema::PERSON_GRAIN;

/// Age in whole years between two spine date columns.
#[derive(Debug, Clone)]
pub struct AgeFeature {
    metadata: FeatureMetadata,
}

impl AgeFeature {
    pub fn new() -> Self {
        let metadata = FeatureMetadata::new("age")
            .with_description("Age in years computed from two date columns.")
            .with_param(ParamSpec::new("start", ParamType::ColumnRef))
            .with_param(ParamSpec::new("end", ParamType::ColumnRef))
            .with_provides(ColumnSpec::new("age").with_dtype("int"))
            .with_grains(&[PERSON_GRAIN]);
        Self { metadata }
    }
}

impl Default for AgeFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature for AgeFeature {
    fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    fn build(&self, ctx: &BuildContext<'_>, params: &Params) -> Result<FeatureAssets> {
        let start = ctx.column_ref_sql(str_param(params, "start")?)?;
        let end = ctx.column_ref_sql(str_param(params, "end")?)?;
        Ok(FeatureAssets::default().with_select(format!(
            "CAST(FLOOR(months_between({end}, {start}) / 12) AS INT) AS age"
        )))
    }
}

/// Fixed age ranges over the `age` output.
#[derive(Debug, Clone)]
pub struct AgeBucketFeature {
    metadata: FeatureMetadata,
}

impl AgeBucketFeature {
    pub fn new() -> Self {
        let metadata = FeatureMetadata::new("age_bucket")
            .with_description("Bucketized age derived from the age feature.")
            .with_provides(ColumnSpec::new("age_bucket").with_dtype("str"))
            .with_grains(&[PERSON_GRAIN]);
        Self { metadata }
    }
}

impl Default for AgeBucketFeature {
    fn default() -> Self {
        Self::new()
    }
}

const AGE_BUCKET_SQL: &str = "CASE \
WHEN age IS NULL THEN NULL \
WHEN age < 18 THEN '0-17' \
WHEN age < 35 THEN '18-34' \
WHEN age < 50 THEN '35-49' \
WHEN age < 65 THEN '50-64' \
ELSE '65+' \
END";

impl Feature for AgeBucketFeature {
    fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    fn build(&self, _ctx: &BuildContext<'_>, _params: &Params) -> Result<FeatureAssets> {
        Ok(FeatureAssets::default().with_select(format!("{AGE_BUCKET_SQL} AS age_bucket")))
    }
}

pub fn register_builtins(registry: &mut FeatureRegistry) -> Result<()> {
    registry.register(AgeFeature::new())?;
    registry.register(AgeBucketFeature::new())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::SemanticContract;
    use crate::features::SPINE_ALIAS;
    use crate::naming::LocalNaming;
    use crate::schema::{MappingSpec, NamingConfig};
    use serde_json::json;

    fn build(feature: &dyn Feature, params: Params) -> FeatureAssets {
        let mapping = MappingSpec::default();
        let contract = SemanticContract::default();
        let naming = NamingConfig::default();
        let ctx = BuildContext {
            pipeline_name: "unit".into(),
            pipeline_slug: "unit".into(),
            grain: PERSON_GRAIN.into(),
            spine_entity: "patients".into(),
            spine_alias: SPINE_ALIAS.into(),
            mapping: &mapping,
            contract: &contract,
            naming: &naming,
            models: &LocalNaming,
        };
        feature.build(&ctx, &params).unwrap()
    }

    #[test]
    fn test_age_expression_uses_spine_alias() {
        let params = Params::from([
            ("start".to_string(), json!("date_of_birth")),
            ("end".to_string(), json!("as_of_date")),
        ]);
        let assets = build(&AgeFeature::new(), params);
        assert_eq!(
            assets.select_expressions,
            vec!["CAST(FLOOR(months_between(p.as_of_date, p.date_of_birth) / 12) AS INT) AS age"]
        );
        assert!(assets.models.is_empty());
        assert!(assets.join_models.is_empty());
    }

    #[test]
    fn test_age_bucket_expression() {
        let assets = build(&AgeBucketFeature::new(), Params::new());
        insta::assert_snapshot!(assets.select_expressions[0], @"CASE WHEN age IS NULL THEN NULL WHEN age < 18 THEN '0-17' WHEN age < 35 THEN '18-34' WHEN age < 50 THEN '35-49' WHEN age < 65 THEN '50-64' ELSE '65+' END AS age_bucket");
    }

    #[test]
    fn test_builtins_are_person_grain() {
        assert!(AgeFeature::new().metadata().supports_grain("PERSON"));
        assert!(!AgeBucketFeature::new().metadata().supports_grain("ENCOUNTER"));
    }
}
