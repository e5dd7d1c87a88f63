//! Configuration for hosted adapters

use crate::contract::AdapterParams;
use crate::normalize::DistributionPolicy;
use scorehost_core::{AdapterDescriptor, Error, Result, SchemaPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Configuration for the whole harness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Adapter specifications by name
    #[serde(default)]
    pub adapters: HashMap<String, AdapterSpec>,

    /// Deadline applied to adapters without their own `timeout_ms`
    #[serde(default)]
    pub default_timeout_ms: Option<u64>,

    /// Exercise freshly constructed adapters with a synthetic instance.
    ///
    /// Only adapters with a declared (or configured) feature count can be
    /// exercised; the rest load without being called and a warning is logged.
    #[serde(default)]
    pub verify_on_load: bool,
}

/// How adapter instances are created and shared between calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Lifecycle {
    /// One instance for the harness lifetime; calls are serialized on it
    #[default]
    Singleton,
    /// `size` independent instances, handed out round-robin
    Pool { size: usize },
    /// A fresh instance for every call
    PerCall,
}

/// Specification of one named adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterSpec {
    /// Factory name that constructs this adapter
    pub implementation: String,

    /// Constructor parameters, passed to the factory untouched
    #[serde(default)]
    pub params: AdapterParams,

    /// Override for the declared feature count
    #[serde(default)]
    pub num_features: Option<usize>,

    /// Override for the declared class count
    #[serde(default)]
    pub num_classes: Option<usize>,

    /// Override for the declared schema policy
    #[serde(default)]
    pub schema_policy: Option<SchemaPolicy>,

    /// Override for the declared nominal class values
    #[serde(default)]
    pub class_labels: Option<Vec<String>>,

    /// Check applied to returned distributions
    #[serde(default)]
    pub distribution_policy: DistributionPolicy,

    /// Instance management
    #[serde(default)]
    pub lifecycle: Lifecycle,

    /// Per-call deadline in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl AdapterSpec {
    /// Spec with defaults for the given implementation
    pub fn new(implementation: impl Into<String>) -> Self {
        Self {
            implementation: implementation.into(),
            params: AdapterParams::new(),
            num_features: None,
            num_classes: None,
            schema_policy: None,
            class_labels: None,
            distribution_policy: DistributionPolicy::default(),
            lifecycle: Lifecycle::default(),
            timeout_ms: None,
        }
    }

    /// Set a constructor parameter
    pub fn with_param(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set lifecycle
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Set distribution policy
    pub fn with_distribution_policy(mut self, policy: DistributionPolicy) -> Self {
        self.distribution_policy = policy;
        self
    }

    /// Set schema policy override
    pub fn with_schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.schema_policy = Some(policy);
        self
    }

    /// Set feature count override
    pub fn with_num_features(mut self, num_features: usize) -> Self {
        self.num_features = Some(num_features);
        self
    }

    /// Set per-call deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Apply configured overrides on top of what the adapter declares
    pub fn merge_descriptor(&self, declared: AdapterDescriptor) -> AdapterDescriptor {
        AdapterDescriptor {
            num_features: self.num_features.or(declared.num_features),
            num_classes: self.num_classes.unwrap_or(declared.num_classes),
            schema_policy: self.schema_policy.unwrap_or(declared.schema_policy),
            class_labels: self
                .class_labels
                .clone()
                .unwrap_or(declared.class_labels),
        }
    }

    /// Validate this spec in isolation
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.implementation.trim().is_empty() {
            return Err(Error::config(format!(
                "Adapter '{}' has an empty implementation name",
                name
            )));
        }
        if let Lifecycle::Pool { size: 0 } = self.lifecycle {
            return Err(Error::config(format!(
                "Adapter '{}' declares a pool of size 0",
                name
            )));
        }
        if self.num_classes == Some(0) {
            return Err(Error::config(format!(
                "Adapter '{}' declares zero classes",
                name
            )));
        }
        if self.timeout_ms == Some(0) {
            return Err(Error::config(format!(
                "Adapter '{}' declares a zero timeout",
                name
            )));
        }
        Ok(())
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            adapters: HashMap::new(),
            default_timeout_ms: None,
            verify_on_load: false,
        }
    }
}

impl HostConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse host config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Validate every adapter spec
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == Some(0) {
            return Err(Error::config("default_timeout_ms must be greater than zero"));
        }
        for (name, spec) in &self.adapters {
            spec.validate(name)?;
        }
        Ok(())
    }

    /// Get an adapter spec by name
    pub fn get_adapter(&self, name: &str) -> Option<&AdapterSpec> {
        self.adapters.get(name)
    }

    /// Get all adapter names
    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// Deadline for the named spec, falling back to the host default
    pub fn timeout_for(&self, spec: &AdapterSpec) -> Option<Duration> {
        spec.timeout_ms
            .or(self.default_timeout_ms)
            .map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scorehost_core::ErrorKind;

    #[test]
    fn test_host_config_yaml() {
        let yaml = r#"
default_timeout_ms: 2000
verify_on_load: true
adapters:
  valid:
    implementation: modulo
  no_probability:
    implementation: classify_only
    lifecycle:
      type: pool
      size: 4
  dummy:
    implementation: constant
    params:
      target_value: 1
    lifecycle:
      type: per_call
    distribution_policy: strict
    timeout_ms: 50
  wide:
    implementation: modulo
    num_features: 6
    schema_policy: permissive
    class_labels: [a, b, c]
"#;

        let config = HostConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.adapters.len(), 4);
        assert!(config.verify_on_load);

        let valid = config.get_adapter("valid").unwrap();
        assert_eq!(valid.lifecycle, Lifecycle::Singleton);
        assert_eq!(valid.distribution_policy, DistributionPolicy::Normalize);
        assert_eq!(config.timeout_for(valid), Some(Duration::from_millis(2000)));

        let pooled = config.get_adapter("no_probability").unwrap();
        assert_eq!(pooled.lifecycle, Lifecycle::Pool { size: 4 });

        let dummy = config.get_adapter("dummy").unwrap();
        assert_eq!(dummy.lifecycle, Lifecycle::PerCall);
        assert_eq!(dummy.params.get("target_value"), Some(&serde_json::json!(1)));
        assert_eq!(config.timeout_for(dummy), Some(Duration::from_millis(50)));

        let wide = config.get_adapter("wide").unwrap();
        assert_eq!(wide.schema_policy, Some(SchemaPolicy::Permissive));
    }

    #[test]
    fn test_merge_descriptor() {
        let mut spec = AdapterSpec::new("modulo").with_num_features(6);
        spec.class_labels = Some(vec!["a".into(), "b".into(), "c".into()]);

        let merged = spec.merge_descriptor(AdapterDescriptor::strict(4, 3));
        assert_eq!(merged.num_features, Some(6));
        assert_eq!(merged.num_classes, 3);
        assert_eq!(merged.schema_policy, SchemaPolicy::Strict);
        assert_eq!(merged.class_labels.len(), 3);

        let untouched =
            AdapterSpec::new("modulo").merge_descriptor(AdapterDescriptor::permissive(2));
        assert_eq!(untouched, AdapterDescriptor::permissive(2));
    }

    #[test]
    fn test_zero_pool_rejected() {
        let yaml = r#"
adapters:
  broken:
    implementation: modulo
    lifecycle:
      type: pool
      size: 0
"#;
        let err = HostConfig::from_yaml(yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_zero_default_timeout_rejected() {
        let err = HostConfig::from_yaml("default_timeout_ms: 0\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("default_timeout_ms"));

        let config = HostConfig::from_yaml("default_timeout_ms: 250\n").unwrap();
        assert_eq!(
            config.timeout_for(&AdapterSpec::new("modulo")),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_missing_implementation_rejected() {
        let err = HostConfig::from_yaml("adapters:\n  x:\n    params: {}\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = AdapterSpec::new("  ").validate("blank").unwrap_err();
        assert!(err.to_string().contains("empty implementation"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.yaml");
        std::fs::write(&path, "adapters:\n  valid:\n    implementation: modulo\n").unwrap();

        let config = HostConfig::from_file(&path).unwrap();
        assert_eq!(config.adapter_names(), vec!["valid".to_string()]);
        assert_eq!(config.timeout_for(config.get_adapter("valid").unwrap()), None);

        let err = HostConfig::from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
