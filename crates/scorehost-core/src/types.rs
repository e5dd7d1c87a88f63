//! Core types for scorehost

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single feature value inside an instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Feature {
    Number(f64),
    Bool(bool),
    Text(String),
    /// JSON `null`
    Missing,
}

impl Feature {
    /// Numeric view of the feature. Booleans map to 0/1; text and missing
    /// values have no numeric reading and map to NaN.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Number(v) => *v,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Text(_) | Self::Missing => f64::NAN,
        }
    }
}

impl From<f64> for Feature {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// One row submitted for scoring.
///
/// Inbound data is not trusted to be array-like, so anything that is not a
/// sequence still deserializes and is rejected later by schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Instance {
    Sequence(Vec<Feature>),
    Scalar(Feature),
    Other(serde_json::Value),
}

impl Instance {
    /// Build a numeric instance
    pub fn numeric(values: impl IntoIterator<Item = f64>) -> Self {
        Self::Sequence(values.into_iter().map(Feature::Number).collect())
    }

    /// Feature values, if this instance is array-like
    pub fn features(&self) -> Option<&[Feature]> {
        match self {
            Self::Sequence(values) => Some(values),
            Self::Scalar(_) | Self::Other(_) => None,
        }
    }

    /// Number of features, if this instance is array-like
    pub fn len(&self) -> Option<usize> {
        self.features().map(<[Feature]>::len)
    }

    /// Numeric view of every feature (empty for non-sequences)
    pub fn values(&self) -> Vec<f64> {
        self.features()
            .map(|features| features.iter().map(Feature::as_f64).collect())
            .unwrap_or_default()
    }
}

impl From<Vec<f64>> for Instance {
    fn from(values: Vec<f64>) -> Self {
        Self::numeric(values)
    }
}

/// An ordered set of instances scored in one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch(Vec<Instance>);

impl Batch {
    /// Create a batch from instances
    pub fn new(instances: Vec<Instance>) -> Self {
        Self(instances)
    }

    /// Create a numeric batch from plain rows
    pub fn from_rows<R>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = f64>,
    {
        rows.into_iter().map(Instance::numeric).collect()
    }

    /// Number of instances
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the batch has no instances
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over instances in order
    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.0.iter()
    }

    /// Borrow the instances
    pub fn instances(&self) -> &[Instance] {
        &self.0
    }
}

impl FromIterator<Instance> for Batch {
    fn from_iter<I: IntoIterator<Item = Instance>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Output of `classify` for one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    /// Class index
    Index(i64),
    /// Float label, e.g. a thresholded score
    Score(f64),
    /// Nominal class value
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Score(s) => write!(f, "{s}"),
            Self::Name(n) => f.write_str(n),
        }
    }
}

/// Per-class probabilities for one instance
pub type Distribution = Vec<f64>;

/// Feature-count enforcement applied by schema validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Instance length must equal the declared feature count
    #[default]
    Strict,
    /// Only the array-like check is applied
    Permissive,
}

/// Declared input and output shape of an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    /// Expected feature count; `None` leaves length unchecked
    #[serde(default)]
    pub num_features: Option<usize>,

    /// Number of output classes
    pub num_classes: usize,

    /// How strictly `num_features` is enforced
    #[serde(default)]
    pub schema_policy: SchemaPolicy,

    /// Nominal class values, in class-index order
    #[serde(default)]
    pub class_labels: Vec<String>,
}

impl AdapterDescriptor {
    /// Strict descriptor with a fixed feature count
    pub fn strict(num_features: usize, num_classes: usize) -> Self {
        Self {
            num_features: Some(num_features),
            num_classes,
            schema_policy: SchemaPolicy::Strict,
            class_labels: Vec::new(),
        }
    }

    /// Length-agnostic descriptor
    pub fn permissive(num_classes: usize) -> Self {
        Self {
            num_features: None,
            num_classes,
            schema_policy: SchemaPolicy::Permissive,
            class_labels: Vec::new(),
        }
    }

    /// Set nominal class values
    pub fn with_class_labels<S: Into<String>>(
        mut self,
        labels: impl IntoIterator<Item = S>,
    ) -> Self {
        self.class_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Feature count actually enforced by validation
    pub fn enforced_features(&self) -> Option<usize> {
        match self.schema_policy {
            SchemaPolicy::Strict => self.num_features,
            SchemaPolicy::Permissive => None,
        }
    }
}

/// One operation of the capability contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Classify,
    ClassDistribution,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classify => f.write_str("classify"),
            Self::ClassDistribution => f.write_str("getClassDistribution"),
        }
    }
}

/// Operations an adapter declares it supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub classify: bool,
    pub class_distribution: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        classify: false,
        class_distribution: false,
    };
    pub const CLASSIFY: Self = Self {
        classify: true,
        class_distribution: false,
    };
    pub const ALL: Self = Self {
        classify: true,
        class_distribution: true,
    };

    /// Whether the given operation is declared
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Classify => self.classify,
            Capability::ClassDistribution => self.class_distribution,
        }
    }

    /// Whether no operation is declared at all
    pub fn is_empty(&self) -> bool {
        !self.classify && !self.class_distribution
    }

    /// Declared operations, classify first
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        [Capability::Classify, Capability::ClassDistribution]
            .into_iter()
            .filter(|c| self.supports(*c))
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::CLASSIFY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_from_json() {
        let raw = r#"[[1, 2.5, null, "x", true], 7, {"a": 1}]"#;
        let batch: Batch = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.len(), 3);

        let first = &batch.instances()[0];
        assert_eq!(first.len(), Some(5));
        let features = first.features().unwrap();
        assert_eq!(features[0], Feature::Number(1.0));
        assert_eq!(features[2], Feature::Missing);
        assert_eq!(features[3], Feature::Text("x".to_string()));

        assert!(matches!(batch.instances()[1], Instance::Scalar(Feature::Number(_))));
        assert!(matches!(batch.instances()[2], Instance::Other(_)));
        assert_eq!(batch.instances()[1].len(), None);
    }

    #[test]
    fn test_nested_row_is_not_array_like() {
        let batch: Batch = serde_json::from_str("[[[1, 2], [3]]]").unwrap();
        assert_eq!(batch.instances()[0].len(), None);
    }

    #[test]
    fn test_numeric_values() {
        let instance: Instance = serde_json::from_str(r#"[1, true, null]"#).unwrap();
        let values = instance.values();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 1.0);
        assert!(values[2].is_nan());
    }

    #[test]
    fn test_label_untagged() {
        let labels: Vec<Label> = serde_json::from_str(r#"[0, 1.0, "fraud"]"#).unwrap();
        assert_eq!(labels[0], Label::Index(0));
        assert_eq!(labels[1], Label::Score(1.0));
        assert_eq!(labels[2], Label::Name("fraud".to_string()));
        assert_eq!(labels[2].to_string(), "fraud");
    }

    #[test]
    fn test_descriptor_yaml() {
        let yaml = r#"
num_features: 4
num_classes: 3
schema_policy: permissive
"#;
        let descriptor: AdapterDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.num_features, Some(4));
        assert_eq!(descriptor.schema_policy, SchemaPolicy::Permissive);
        assert_eq!(descriptor.enforced_features(), None);
        assert!(descriptor.class_labels.is_empty());
    }

    #[test]
    fn test_capabilities() {
        assert!(Capabilities::NONE.is_empty());
        assert!(!Capabilities::CLASSIFY.supports(Capability::ClassDistribution));
        let declared: Vec<_> = Capabilities::ALL.iter().collect();
        assert_eq!(declared, vec![Capability::Classify, Capability::ClassDistribution]);
        assert_eq!(Capabilities::default(), Capabilities::CLASSIFY);
    }
}
