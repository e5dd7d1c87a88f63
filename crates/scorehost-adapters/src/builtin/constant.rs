//! Adapter answering with configured values
//!
//! `classify` returns exactly one label per call, whatever the batch size,
//! so any batch of more than one instance is a cardinality violation at
//! the dispatcher.

use super::param;
use crate::contract::{AdapterParams, ClassifierAdapter};
use anyhow::Context;
use scorehost_core::{AdapterDescriptor, Batch, Capabilities, Distribution, Label};

pub const NAME: &str = "constant";

const DEFAULT_NUM_CLASSES: usize = 2;

#[derive(Debug, Clone)]
pub struct ConstantAdapter {
    target: Label,
    distribution: Option<Distribution>,
    num_classes: usize,
}

impl ConstantAdapter {
    /// Create from a target label and optional distribution
    pub fn new(target: Label, distribution: Option<Distribution>) -> Self {
        let num_classes = distribution
            .as_ref()
            .map_or(DEFAULT_NUM_CLASSES, Vec::len);
        Self {
            target,
            distribution,
            num_classes,
        }
    }

    /// Build from `target_value` (required), `distribution` and `num_classes`
    pub fn from_params(params: &AdapterParams) -> anyhow::Result<Self> {
        let target: Label = param(params, "target_value")?
            .context("missing required parameter 'target_value'")?;
        let distribution: Option<Distribution> = param(params, "distribution")?;

        let mut adapter = Self::new(target, distribution);
        if let Some(num_classes) = param::<usize>(params, "num_classes")? {
            adapter.num_classes = num_classes;
        }
        Ok(adapter)
    }
}

impl ClassifierAdapter for ConstantAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::permissive(self.num_classes)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            classify: true,
            class_distribution: self.distribution.is_some(),
        }
    }

    fn classify(&mut self, _batch: &Batch) -> anyhow::Result<Vec<Label>> {
        Ok(vec![self.target.clone()])
    }

    fn class_distribution(&mut self, batch: &Batch) -> anyhow::Result<Vec<Distribution>> {
        let distribution = self
            .distribution
            .as_ref()
            .context("no distribution configured")?;
        Ok(vec![distribution.clone(); batch.len()])
    }
}
