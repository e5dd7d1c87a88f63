//! Batch shape validation against an adapter descriptor

use scorehost_core::{AdapterDescriptor, Batch, Error, Instance, Result};

/// Validate every instance of `batch` against `descriptor`.
///
/// Instances are checked in order and the first failure rejects the whole
/// batch:
/// 1. the instance must be array-like (`MalformedInstance`);
/// 2. under a strict policy with a declared feature count, its length must
///    match exactly (`SchemaMismatch`).
pub fn validate(batch: &Batch, descriptor: &AdapterDescriptor) -> Result<()> {
    let expected = descriptor.enforced_features();

    for (index, instance) in batch.iter().enumerate() {
        let Some(actual) = instance.len() else {
            return Err(Error::MalformedInstance {
                index,
                detail: format!("instance must be an array, got {}", shape_of(instance)),
            });
        };

        if let Some(expected) = expected {
            if actual != expected {
                return Err(Error::SchemaMismatch {
                    index,
                    actual,
                    expected,
                });
            }
        }
    }

    Ok(())
}

fn shape_of(instance: &Instance) -> &'static str {
    match instance {
        Instance::Sequence(_) => "array",
        Instance::Scalar(_) => "scalar",
        Instance::Other(serde_json::Value::Object(_)) => "object",
        Instance::Other(serde_json::Value::Array(_)) => "nested array",
        Instance::Other(_) => "non-array value",
    }
}
