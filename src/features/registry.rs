use std::collections::BTreeMap;

use super::{register_builtins, register_geisinger_features, Feature};
use crate::error::{Error, Result};

/// Keyed catalog of features.
///
/// Built once during start-up and then shared read-only with the compiler.
#[derive(Default)]
pub struct FeatureRegistry {
    features: BTreeMap<String, Box<dyn Feature>>,
}

impl FeatureRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in and client features registered.
    pub fn with_builtins() -> Result<Self> {
        let mut registry = Self::new();
        register_builtins(&mut registry)?;
        register_geisinger_features(&mut registry)?;
        Ok(registry)
    }

    /// Register a feature under its metadata key. Duplicate keys are rejected.
    pub fn register(&mut self, feature: impl Feature + 'static) -> Result<()> {
        let key = feature.metadata().key.clone();
        if self.features.contains_key(&key) {
            return Err(Error::validation(format!(
                "Feature already registered: {key}"
            )));
        }
        self.features.insert(key, Box::new(feature));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<&dyn Feature> {
        self.features
            .get(key)
            .map(Box::as_ref)
            .ok_or_else(|| Error::FeatureNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.features.contains_key(key)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Feature> {
        self.features.values().map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl std::fmt::Debug for FeatureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureRegistry")
            .field("features", &self.features.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::features::AgeFeature;

    #[test]
    fn test_with_builtins_registers_all_features() {
        let registry = FeatureRegistry::with_builtins().unwrap();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(keys, vec!["age", "age_bucket", "geisinger.forward_65_flag"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = FeatureRegistry::new();
        registry.register(AgeFeature::new()).unwrap();
        let err = registry.register(AgeFeature::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_key_is_feature_not_found() {
        let registry = FeatureRegistry::new();
        let err = registry.get("missing.feature").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::FeatureNotFound);
        assert_eq!(err.to_string(), "Unknown feature key: missing.feature");
    }
}
