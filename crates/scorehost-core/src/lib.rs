//! scorehost Core
//!
//! Core types and error handling shared across scorehost components.
//!
//! This crate provides:
//! - The batch data model (instances, features, labels, distributions)
//! - Adapter descriptors and declared capabilities
//! - The harness error taxonomy and result alias

pub mod error;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use types::{
    AdapterDescriptor, Batch, Capabilities, Capability, Distribution, Feature, Instance, Label,
    SchemaPolicy,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::types::{
        AdapterDescriptor, Batch, Capabilities, Capability, Distribution, Instance, Label,
        SchemaPolicy,
    };
}
