//! Adapter that accepts any length at the harness level but enforces its
//! own arity when called

use crate::contract::ClassifierAdapter;
use scorehost_core::{AdapterDescriptor, Batch, Capabilities, Distribution, Label};

pub const NAME: &str = "fixed_arity";

const ARITY: usize = 3;
const NUM_CLASSES: usize = 3;

#[derive(Debug, Default)]
pub struct FixedArityAdapter;

impl FixedArityAdapter {
    fn check(batch: &Batch) -> anyhow::Result<()> {
        for (index, instance) in batch.iter().enumerate() {
            let len = instance.len().unwrap_or(0);
            if len != ARITY {
                anyhow::bail!(
                    "incorrect number of features in instance {}: got {}, expected {}",
                    index,
                    len,
                    ARITY
                );
            }
        }
        Ok(())
    }
}

impl ClassifierAdapter for FixedArityAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::permissive(NUM_CLASSES)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn classify(&mut self, batch: &Batch) -> anyhow::Result<Vec<Label>> {
        Self::check(batch)?;
        Ok(vec![Label::Index(0); batch.len()])
    }

    fn class_distribution(&mut self, batch: &Batch) -> anyhow::Result<Vec<Distribution>> {
        Self::check(batch)?;
        Ok(vec![vec![1.0, 0.0, 0.0]; batch.len()])
    }
}
