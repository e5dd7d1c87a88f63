//! Modulo-of-sum reference adapters

use super::{numeric_features, seeded_weights};
use crate::contract::ClassifierAdapter;
use crate::normalize::normalize;
use scorehost_core::{AdapterDescriptor, Batch, Capabilities, Distribution, Label};

pub const MODULO: &str = "modulo";
pub const REVERSE_MODULO: &str = "reverse_modulo";
pub const CLASSIFY_ONLY: &str = "classify_only";

const NUM_FEATURES: usize = 4;
const NUM_CLASSES: usize = 3;

/// Confidence `reverse_modulo` puts on its predicted class
const REVERSE_CONFIDENCE: f64 = 0.6;

fn modulo_class(values: &[f64]) -> usize {
    values.iter().sum::<f64>().floor().rem_euclid(NUM_CLASSES as f64) as usize
}

fn classes_of(batch: &Batch, class: impl Fn(&[f64]) -> usize) -> anyhow::Result<Vec<Label>> {
    batch
        .iter()
        .enumerate()
        .map(|(index, instance)| {
            let values = numeric_features(index, instance)?;
            Ok(Label::Index(class(&values) as i64))
        })
        .collect()
}

/// Class `floor(sum) mod 3`; seeded distribution per instance
#[derive(Debug, Default)]
pub struct ModuloAdapter;

impl ClassifierAdapter for ModuloAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::strict(NUM_FEATURES, NUM_CLASSES)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn classify(&mut self, batch: &Batch) -> anyhow::Result<Vec<Label>> {
        classes_of(batch, modulo_class)
    }

    fn class_distribution(&mut self, batch: &Batch) -> anyhow::Result<Vec<Distribution>> {
        batch
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let values = numeric_features(index, instance)?;
                let weights = seeded_weights(&values, NUM_CLASSES);
                Ok(normalize(&weights))
            })
            .collect()
    }
}

/// Class `2 - (floor(sum) mod 3)` with a fixed-confidence distribution
#[derive(Debug, Default)]
pub struct ReverseModuloAdapter;

impl ReverseModuloAdapter {
    fn class(values: &[f64]) -> usize {
        NUM_CLASSES - 1 - modulo_class(values)
    }
}

impl ClassifierAdapter for ReverseModuloAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::strict(NUM_FEATURES, NUM_CLASSES)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    fn classify(&mut self, batch: &Batch) -> anyhow::Result<Vec<Label>> {
        classes_of(batch, Self::class)
    }

    fn class_distribution(&mut self, batch: &Batch) -> anyhow::Result<Vec<Distribution>> {
        let rest = (1.0 - REVERSE_CONFIDENCE) / (NUM_CLASSES - 1) as f64;
        batch
            .iter()
            .enumerate()
            .map(|(index, instance)| {
                let values = numeric_features(index, instance)?;
                let mut distribution = vec![rest; NUM_CLASSES];
                distribution[Self::class(&values)] = REVERSE_CONFIDENCE;
                Ok(distribution)
            })
            .collect()
    }
}

/// `modulo` classification without a distribution capability
#[derive(Debug, Default)]
pub struct ClassifyOnlyAdapter;

impl ClassifierAdapter for ClassifyOnlyAdapter {
    fn descriptor(&self) -> AdapterDescriptor {
        AdapterDescriptor::strict(NUM_FEATURES, NUM_CLASSES)
    }

    fn classify(&mut self, batch: &Batch) -> anyhow::Result<Vec<Label>> {
        classes_of(batch, modulo_class)
    }
}
