//! scorehost Adapters
//!
//! Hosting harness for untrusted classifier adapters.
//!
//! Calls flow through a single [`Dispatcher`]:
//! - the [`AdapterRegistry`] resolves an adapter name to a loaded handle,
//!   constructing instances on first use
//! - the schema validator rejects malformed batches before any adapter code runs
//! - the adapter is invoked on the blocking pool under its deadline, with
//!   access to each instance serialized
//! - outputs are checked for cardinality and distributions are normalized
//!
//! Adapters implement [`ClassifierAdapter`] and are constructed through an
//! [`AdapterFactory`] registered under an implementation name.

pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod handle;
pub mod normalize;
pub mod registry;
pub mod schema;
pub mod telemetry;

#[cfg(feature = "builtin-adapters")]
pub mod builtin;

pub use config::{AdapterSpec, HostConfig, Lifecycle};
pub use contract::{AdapterFactory, AdapterParams, ClassifierAdapter, FnFactory, NotImplemented};
pub use dispatcher::Dispatcher;
pub use handle::AdapterHandle;
pub use normalize::DistributionPolicy;
pub use registry::{AdapterRegistry, RegistryBuilder};
pub use telemetry::describe_metrics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{AdapterSpec, HostConfig, Lifecycle};
    pub use crate::contract::{AdapterFactory, AdapterParams, ClassifierAdapter, FnFactory};
    pub use crate::dispatcher::Dispatcher;
    pub use crate::normalize::DistributionPolicy;
    pub use crate::registry::{AdapterRegistry, RegistryBuilder};
    pub use scorehost_core::prelude::*;
}
