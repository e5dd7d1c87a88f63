//! Built-in reference adapters
//!
//! Small deterministic adapters used to exercise the harness end to end:
//!
//! | implementation   | capabilities        | notes                                   |
//! |------------------|---------------------|-----------------------------------------|
//! | `modulo`         | both                | 4 features, 3 classes                   |
//! | `reverse_modulo` | both                | mirrored classes, fixed 0.6 confidence  |
//! | `classify_only`  | classify            | `modulo` without distributions          |
//! | `fixed_arity`    | both                | permissive descriptor, rejects len != 3 |
//! | `constant`       | classify (+ dist.)  | one label per call, whatever the batch  |
//! | `dumping`        | both                | stateful, writes a line-oriented dump   |

pub mod constant;
pub mod dumping;
pub mod fixed_arity;
pub mod modulo;

pub use constant::ConstantAdapter;
pub use dumping::DumpingAdapter;
pub use fixed_arity::FixedArityAdapter;
pub use modulo::{ClassifyOnlyAdapter, ModuloAdapter, ReverseModuloAdapter};

use crate::contract::{AdapterParams, ClassifierAdapter, FnFactory};
use crate::registry::AdapterRegistry;
use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use scorehost_core::Instance;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// Register a factory for every built-in adapter
pub fn register_all(registry: &AdapterRegistry) {
    registry.register_factory(Arc::new(FnFactory::new(
        modulo::MODULO,
        |_p: &AdapterParams| Ok(Box::new(ModuloAdapter) as Box<dyn ClassifierAdapter>),
    )));
    registry.register_factory(Arc::new(FnFactory::new(
        modulo::REVERSE_MODULO,
        |_p: &AdapterParams| Ok(Box::new(ReverseModuloAdapter) as Box<dyn ClassifierAdapter>),
    )));
    registry.register_factory(Arc::new(FnFactory::new(
        modulo::CLASSIFY_ONLY,
        |_p: &AdapterParams| Ok(Box::new(ClassifyOnlyAdapter) as Box<dyn ClassifierAdapter>),
    )));
    registry.register_factory(Arc::new(FnFactory::new(
        fixed_arity::NAME,
        |_p: &AdapterParams| Ok(Box::new(FixedArityAdapter) as Box<dyn ClassifierAdapter>),
    )));
    registry.register_factory(Arc::new(FnFactory::new(constant::NAME, |p: &AdapterParams| {
        Ok(Box::new(ConstantAdapter::from_params(p)?) as Box<dyn ClassifierAdapter>)
    })));
    registry.register_factory(Arc::new(FnFactory::new(dumping::NAME, |p: &AdapterParams| {
        Ok(Box::new(DumpingAdapter::from_params(p)?) as Box<dyn ClassifierAdapter>)
    })));
}

/// Read an optional typed parameter
pub(crate) fn param<T: DeserializeOwned>(
    params: &AdapterParams,
    key: &str,
) -> anyhow::Result<Option<T>> {
    params
        .get(key)
        .map(|value| {
            serde_json::from_value(value.clone())
                .with_context(|| format!("invalid value for parameter '{}'", key))
        })
        .transpose()
}

/// Numeric features of an instance, rejecting anything that has no number
pub(crate) fn numeric_features(index: usize, instance: &Instance) -> anyhow::Result<Vec<f64>> {
    let values = instance.values();
    if values.iter().any(|v| !v.is_finite()) {
        anyhow::bail!("instance {} has non-numeric features", index);
    }
    Ok(values)
}

/// `count` distinct integer weights in 1..100, seeded by the first feature
pub(crate) fn seeded_weights(values: &[f64], count: usize) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(values.first().map_or(0, |v| v.to_bits()));
    index::sample(&mut rng, 99, count.min(99))
        .into_iter()
        .map(|i| (i + 1) as f64)
        .collect()
}
