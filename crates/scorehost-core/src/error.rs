//! Error types for scorehost

use std::time::Duration;

use crate::types::Capability;

/// Result type alias using scorehost's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for harness operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An instance in the batch is not array-like
    #[error("malformed instance at index {index}: {detail}")]
    MalformedInstance { index: usize, detail: String },

    /// An instance has the wrong number of features
    #[error(
        "incorrect number of features in instance {index}: got {actual}, expected {expected}"
    )]
    SchemaMismatch {
        index: usize,
        actual: usize,
        expected: usize,
    },

    /// The named adapter could not be resolved or constructed
    #[error("failed to load adapter '{adapter}': {reason}")]
    AdapterLoad { adapter: String, reason: String },

    /// The adapter broke its declared or implicit output contract
    #[error("adapter '{adapter}' violated its contract: {detail}")]
    ContractViolation { adapter: String, detail: String },

    /// The adapter does not offer the requested operation
    #[error("adapter '{adapter}' does not support {capability}")]
    CapabilityNotSupported {
        adapter: String,
        capability: Capability,
    },

    /// The adapter declared an operation but provides no implementation of it
    #[error("adapter '{adapter}' does not implement {capability}")]
    NotImplemented {
        adapter: String,
        capability: Capability,
    },

    /// A returned distribution cannot be turned into probabilities
    #[error("invalid distribution for instance {index}: {reason}")]
    InvalidDistribution { index: usize, reason: String },

    /// The adapter failed while scoring
    #[error("adapter '{adapter}' failed: {message}")]
    AdapterRuntime { adapter: String, message: String },

    /// The adapter did not answer within its deadline
    #[error("adapter '{adapter}' timed out after {timeout:?}")]
    AdapterTimeout { adapter: String, timeout: Duration },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Discriminant of [`Error`], for callers that branch on failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInstance,
    SchemaMismatch,
    AdapterLoad,
    ContractViolation,
    CapabilityNotSupported,
    NotImplemented,
    InvalidDistribution,
    AdapterRuntime,
    AdapterTimeout,
    Config,
    Io,
    Serialization,
}

impl ErrorKind {
    /// Stable snake_case name, used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedInstance => "malformed_instance",
            Self::SchemaMismatch => "schema_mismatch",
            Self::AdapterLoad => "adapter_load",
            Self::ContractViolation => "contract_violation",
            Self::CapabilityNotSupported => "capability_not_supported",
            Self::NotImplemented => "not_implemented",
            Self::InvalidDistribution => "invalid_distribution",
            Self::AdapterRuntime => "adapter_runtime",
            Self::AdapterTimeout => "adapter_timeout",
            Self::Config => "config",
            Self::Io => "io",
            Self::Serialization => "serialization",
        }
    }
}

impl Error {
    /// Create a new adapter load error
    pub fn adapter_load(adapter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AdapterLoad {
            adapter: adapter.into(),
            reason: reason.into(),
        }
    }

    /// Create a new contract violation error
    pub fn contract(adapter: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ContractViolation {
            adapter: adapter.into(),
            detail: detail.into(),
        }
    }

    /// Create a new adapter runtime error
    pub fn runtime(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AdapterRuntime {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid distribution error
    pub fn invalid_distribution(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            index,
            reason: reason.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInstance { .. } => ErrorKind::MalformedInstance,
            Self::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Self::AdapterLoad { .. } => ErrorKind::AdapterLoad,
            Self::ContractViolation { .. } => ErrorKind::ContractViolation,
            Self::CapabilityNotSupported { .. } => ErrorKind::CapabilityNotSupported,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::InvalidDistribution { .. } => ErrorKind::InvalidDistribution,
            Self::AdapterRuntime { .. } => ErrorKind::AdapterRuntime,
            Self::AdapterTimeout { .. } => ErrorKind::AdapterTimeout,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the error was raised by the harness before any adapter call
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedInstance | ErrorKind::SchemaMismatch
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_message() {
        let err = Error::SchemaMismatch {
            index: 0,
            actual: 2,
            expected: 3,
        };
        assert_eq!(
            err.to_string(),
            "incorrect number of features in instance 0: got 2, expected 3"
        );
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.is_validation());
    }

    #[test]
    fn test_runtime_error_is_not_validation() {
        let err = Error::runtime("modulo", "boom");
        assert_eq!(err.kind().as_str(), "adapter_runtime");
        assert!(!err.is_validation());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_capability_display() {
        let err = Error::CapabilityNotSupported {
            adapter: "classify_only".to_string(),
            capability: Capability::ClassDistribution,
        };
        assert_eq!(
            err.to_string(),
            "adapter 'classify_only' does not support getClassDistribution"
        );
    }
}
