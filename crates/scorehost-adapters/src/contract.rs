//! Capability contract implemented by every classifier adapter
//!
//! Adapters are untrusted collaborator code. They are synchronous, may keep
//! mutable state between calls, and report failures through `anyhow` so the
//! dispatcher can preserve whatever detail they attach.

use scorehost_core::{AdapterDescriptor, Batch, Capabilities, Capability, Distribution, Label};

/// Opaque constructor parameters passed through from configuration
pub type AdapterParams = serde_json::Map<String, serde_json::Value>;

/// Marker error returned by contract methods an adapter has no body for
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} must be implemented by a concrete adapter")]
pub struct NotImplemented(pub Capability);

/// Trait for all classifier adapters
pub trait ClassifierAdapter: Send {
    /// Declared input/output shape
    fn descriptor(&self) -> AdapterDescriptor;

    /// Operations this adapter declares. Checked once at load time.
    fn capabilities(&self) -> Capabilities {
        Capabilities::CLASSIFY
    }

    /// Classify every instance of the batch, in order
    fn classify(&mut self, _batch: &Batch) -> anyhow::Result<Vec<Label>> {
        Err(NotImplemented(Capability::Classify).into())
    }

    /// Class probability distribution for every instance of the batch, in order
    fn class_distribution(&mut self, _batch: &Batch) -> anyhow::Result<Vec<Distribution>> {
        Err(NotImplemented(Capability::ClassDistribution).into())
    }
}

/// Constructs adapter instances for one implementation name.
///
/// Factories are the artifact-loading seam: whatever resolves weights or
/// code for an adapter lives behind `create`.
pub trait AdapterFactory: Send + Sync {
    /// Implementation name referenced from configuration
    fn name(&self) -> &str;

    /// Construct a fresh adapter instance
    fn create(&self, params: &AdapterParams) -> anyhow::Result<Box<dyn ClassifierAdapter>>;
}

/// Factory backed by a closure
pub struct FnFactory<F> {
    name: String,
    build: F,
}

impl<F> FnFactory<F>
where
    F: Fn(&AdapterParams) -> anyhow::Result<Box<dyn ClassifierAdapter>> + Send + Sync,
{
    /// Create a factory from a constructor closure
    pub fn new(name: impl Into<String>, build: F) -> Self {
        Self {
            name: name.into(),
            build,
        }
    }
}

impl<F> AdapterFactory for FnFactory<F>
where
    F: Fn(&AdapterParams) -> anyhow::Result<Box<dyn ClassifierAdapter>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, params: &AdapterParams) -> anyhow::Result<Box<dyn ClassifierAdapter>> {
        (self.build)(params)
    }
}

// Both traits are stored as trait objects by the registry.
const _: () = {
    fn _assert_object_safe(_: &dyn ClassifierAdapter, _: &dyn AdapterFactory) {}
};
