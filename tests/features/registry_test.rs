//! Tests for registering and looking up features.

use spark_preprocessor::features::{
    BuildContext, ColumnSpec, Feature, FeatureAssets, FeatureMetadata, FeatureRegistry, Params,
    ParamType,
};
use spark_preprocessor::{ErrorKind, Result};

struct ClientFlag {
    metadata: FeatureMetadata,
}

impl ClientFlag {
    fn new(key: &str) -> Self {
        Self {
            metadata: FeatureMetadata::new(key)
                .with_provides(ColumnSpec::new("client_flag").with_dtype("str")),
        }
    }
}

impl Feature for ClientFlag {
    fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    fn build(&self, _ctx: &BuildContext<'_>, _params: &Params) -> Result<FeatureAssets> {
        Ok(FeatureAssets::default().with_select("'Y' AS client_flag"))
    }
}

#[test]
fn test_builtin_catalog() {
    let registry = FeatureRegistry::with_builtins().unwrap();
    let keys: Vec<&str> = registry.keys().collect();
    assert_eq!(keys, vec!["age", "age_bucket", "geisinger.forward_65_flag"]);
    assert_eq!(registry.len(), 3);
    assert!(!registry.is_empty());
}

#[test]
fn test_builtin_metadata() {
    let registry = FeatureRegistry::with_builtins().unwrap();

    let age = registry.get("age").unwrap().metadata();
    let params: Vec<(&str, ParamType, bool)> = age
        .params
        .iter()
        .map(|p| (p.name.as_str(), p.param_type, p.required))
        .collect();
    assert_eq!(
        params,
        vec![
            ("start", ParamType::ColumnRef, true),
            ("end", ParamType::ColumnRef, true),
        ]
    );
    assert!(age.supports_grain("PERSON"));
    assert!(!age.supports_grain("ENCOUNTER"));

    let bucket = registry.get("age_bucket").unwrap().metadata();
    assert_eq!(
        bucket.provided_names().into_iter().collect::<Vec<_>>(),
        vec!["age_bucket"]
    );
}

#[test]
fn test_custom_feature_is_listed_in_key_order() {
    let mut registry = FeatureRegistry::with_builtins().unwrap();
    registry.register(ClientFlag::new("acme.client_flag")).unwrap();

    assert!(registry.contains("acme.client_flag"));
    assert_eq!(registry.keys().next(), Some("acme.client_flag"));
    assert!(registry.get("acme.client_flag").unwrap().metadata().supports_grain("ENCOUNTER"));
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = FeatureRegistry::new();
    registry.register(ClientFlag::new("acme.client_flag")).unwrap();
    let err = registry
        .register(ClientFlag::new("acme.client_flag"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("acme.client_flag"));
}

#[test]
fn test_unknown_key() {
    let registry = FeatureRegistry::new();
    assert!(registry.is_empty());
    let err = registry.get("nope").err().unwrap();
    assert_eq!(err.kind(), ErrorKind::FeatureNotFound);
    assert_eq!(err.to_string(), "Unknown feature key: nope");
}
