//! Geisinger client features.

use super::{
    BuildContext, ColumnSpec, Feature, FeatureAssets, FeatureMetadata, FeatureRegistry,
    FeatureRequirement, JoinModelSpec, JoinType, ModelSpec, Params,
};
use crate::error::Result;
use crate::schema::PERSON_GRAIN;

const REFERENCE: &str = "physicians_65_forward";
const JOIN_ALIAS: &str = "f65";

/// Flags people whose PCP is associated with Geisinger 65 Forward.
///
/// Needs `patients.pcp_name` on the spine and a `physicians_65_forward`
/// reference with `pcp_name` and `active65f`. Emits a `Y`/`N` flag.
#[derive(Debug, Clone)]
pub struct Forward65FlagFeature {
    metadata: FeatureMetadata,
}

impl Forward65FlagFeature {
    pub fn new() -> Self {
        let metadata = FeatureMetadata::new("geisinger.forward_65_flag")
            .with_description(
                "Flag indicating if a person has a PCP associated with Geisinger 65 Forward.",
            )
            .with_requirement(FeatureRequirement::new("patients", &["pcp_name"]))
            .with_requirement(FeatureRequirement::new(REFERENCE, &["pcp_name", "active65f"]))
            .with_provides(ColumnSpec::new("forward_65_flag").with_dtype("str"))
            .with_grains(&[PERSON_GRAIN]);
        Self { metadata }
    }
}

impl Default for Forward65FlagFeature {
    fn default() -> Self {
        Self::new()
    }
}

impl Feature for Forward65FlagFeature {
    fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    fn build(&self, ctx: &BuildContext<'_>, _params: &Params) -> Result<FeatureAssets> {
        let model_name = ctx.feature_model_name(&self.metadata.key, "65_forward_pcp")?;
        let reference_model = ctx.semantic_reference_model_name(REFERENCE)?;
        let pcp_name = ctx.column_ref_sql("pcp_name")?;

        let sql = format!(
            "SELECT DISTINCT pcp_name\n\
             FROM {reference_model}\n\
             WHERE active65f = 1\n  \
             AND pcp_name IS NOT NULL"
        );

        Ok(FeatureAssets::default()
            .with_model(ModelSpec::view(model_name.clone(), sql))
            .with_join(JoinModelSpec {
                model_name,
                alias: JOIN_ALIAS.to_string(),
                on: format!("COALESCE({pcp_name}, '') = {JOIN_ALIAS}.pcp_name"),
                join_type: JoinType::Left,
            })
            .with_select(format!(
                "CASE WHEN {JOIN_ALIAS}.pcp_name IS NOT NULL THEN 'Y' ELSE 'N' END AS forward_65_flag"
            )))
    }
}

pub fn register_geisinger_features(registry: &mut FeatureRegistry) -> Result<()> {
    registry.register(Forward65FlagFeature::new())
}
