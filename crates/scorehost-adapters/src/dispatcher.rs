//! Invocation dispatcher
//!
//! The single entry point for scoring. Every call resolves the adapter,
//! validates the batch against its descriptor, checks the declared
//! capability, invokes the adapter under its deadline and then checks the
//! adapter's output before handing it back.

use crate::contract::NotImplemented;
use crate::handle::AdapterHandle;
use crate::normalize;
use crate::registry::AdapterRegistry;
use crate::schema;
use crate::telemetry;
use scorehost_core::{AdapterDescriptor, Batch, Capability, Distribution, Error, Label, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Routes scoring calls to adapters held by a registry
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<AdapterRegistry>,
}

impl Dispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// The registry adapters are resolved from
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Classify every instance of `batch` with the named adapter
    pub async fn classify(&self, name: &str, batch: impl Into<Arc<Batch>>) -> Result<Vec<Label>> {
        self.classify_with_deadline(name, batch, None).await
    }

    /// Like [`classify`](Self::classify), overriding the configured deadline
    pub async fn classify_with_deadline(
        &self,
        name: &str,
        batch: impl Into<Arc<Batch>>,
        deadline: Option<Duration>,
    ) -> Result<Vec<Label>> {
        let batch = batch.into();
        observe(name, Capability::Classify, async {
            let (_, labels) = self.run_classify(name, batch, deadline).await?;
            Ok(labels)
        })
        .await
    }

    /// Classify and map every label to its class index.
    ///
    /// Accepted labels are in-range indices, integral scores and names
    /// listed in the descriptor's `class_labels`.
    pub async fn classify_indices(
        &self,
        name: &str,
        batch: impl Into<Arc<Batch>>,
    ) -> Result<Vec<usize>> {
        let batch = batch.into();
        observe(name, Capability::Classify, async {
            let (handle, labels) = self.run_classify(name, batch, None).await?;
            labels
                .iter()
                .enumerate()
                .map(|(index, label)| {
                    class_index(handle.descriptor(), label).ok_or_else(|| {
                        Error::contract(
                            name,
                            format!(
                                "unexpected class '{}' for instance {}; expected values: {}",
                                label,
                                index,
                                expected_values(handle.descriptor())
                            ),
                        )
                    })
                })
                .collect()
        })
        .await
    }

    /// Class probability distribution for every instance of `batch`
    pub async fn class_distribution(
        &self,
        name: &str,
        batch: impl Into<Arc<Batch>>,
    ) -> Result<Vec<Distribution>> {
        self.class_distribution_with_deadline(name, batch, None).await
    }

    /// Like [`class_distribution`](Self::class_distribution), overriding the
    /// configured deadline
    pub async fn class_distribution_with_deadline(
        &self,
        name: &str,
        batch: impl Into<Arc<Batch>>,
        deadline: Option<Duration>,
    ) -> Result<Vec<Distribution>> {
        let batch = batch.into();
        observe(name, Capability::ClassDistribution, async {
            let handle = self.prepare(name, &batch, Capability::ClassDistribution).await?;
            if batch.is_empty() {
                return Ok(Vec::new());
            }

            let expected = batch.len();
            let vectors = handle
                .invoke(deadline.or(handle.timeout()), move |adapter| {
                    adapter.class_distribution(&batch)
                })
                .await?
                .map_err(|e| adapter_error(&handle, e))?;

            check_cardinality(&handle, Capability::ClassDistribution, vectors.len(), expected)?;

            let width = handle.descriptor().num_classes;
            let misshapen = vectors.iter().enumerate().find(|(_, v)| v.len() != width);
            if let Some((index, vector)) = misshapen {
                return Err(Error::contract(
                    handle.name(),
                    format!(
                        "distribution for instance {} has {} entries, expected {}",
                        index,
                        vector.len(),
                        width
                    ),
                ));
            }

            let policy = handle.distribution_policy();
            vectors
                .into_iter()
                .enumerate()
                .map(|(index, vector)| normalize::check(index, vector, policy))
                .collect()
        })
        .await
    }

    async fn run_classify(
        &self,
        name: &str,
        batch: Arc<Batch>,
        deadline: Option<Duration>,
    ) -> Result<(AdapterHandle, Vec<Label>)> {
        let handle = self.prepare(name, &batch, Capability::Classify).await?;
        if batch.is_empty() {
            return Ok((handle, Vec::new()));
        }

        let expected = batch.len();
        let labels = handle
            .invoke(deadline.or(handle.timeout()), move |adapter| adapter.classify(&batch))
            .await?
            .map_err(|e| adapter_error(&handle, e))?;

        check_cardinality(&handle, Capability::Classify, labels.len(), expected)?;
        Ok((handle, labels))
    }

    /// Resolve, validate and check the capability, in that order
    async fn prepare(
        &self,
        name: &str,
        batch: &Batch,
        capability: Capability,
    ) -> Result<AdapterHandle> {
        let handle = self.registry.resolve(name).await?;
        schema::validate(batch, handle.descriptor())?;

        if !handle.capabilities().supports(capability) {
            return Err(Error::CapabilityNotSupported {
                adapter: name.to_string(),
                capability,
            });
        }

        Ok(handle)
    }
}

/// Record metrics and log the outcome of one dispatched call
async fn observe<T, F>(name: &str, capability: Capability, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let operation = operation_label(capability);
    let started = Instant::now();
    let result = call.await;
    let elapsed = started.elapsed();

    let latency_us = elapsed.as_micros() as u64;

    metrics::counter!(
        telemetry::CALLS_TOTAL,
        "adapter" => name.to_string(),
        "operation" => operation
    )
    .increment(1);
    metrics::histogram!(
        telemetry::CALL_LATENCY_US,
        "adapter" => name.to_string(),
        "operation" => operation
    )
    .record(latency_us as f64);

    match &result {
        Ok(_) => debug!(adapter = name, operation, latency_us, "Dispatch complete"),
        Err(e) => {
            metrics::counter!(
                telemetry::ERRORS_TOTAL,
                "adapter" => name.to_string(),
                "kind" => e.kind().as_str()
            )
            .increment(1);
            if e.is_validation() {
                debug!(adapter = name, operation, "Rejected batch: {}", e);
            } else {
                warn!(adapter = name, operation, "Dispatch failed: {}", e);
            }
        }
    }

    result
}

fn operation_label(capability: Capability) -> &'static str {
    match capability {
        Capability::Classify => "classify",
        Capability::ClassDistribution => "class_distribution",
    }
}

/// Map an adapter-origin failure into the harness taxonomy
fn adapter_error(handle: &AdapterHandle, err: anyhow::Error) -> Error {
    match err.downcast_ref::<NotImplemented>() {
        Some(NotImplemented(capability)) => Error::NotImplemented {
            adapter: handle.name().to_string(),
            capability: *capability,
        },
        None => Error::runtime(handle.name(), format!("{:#}", err)),
    }
}

fn check_cardinality(
    handle: &AdapterHandle,
    capability: Capability,
    actual: usize,
    expected: usize,
) -> Result<()> {
    if actual != expected {
        return Err(Error::contract(
            handle.name(),
            format!(
                "{} returned {} results for a batch of {} instances",
                capability, actual, expected
            ),
        ));
    }
    Ok(())
}

fn class_index(descriptor: &AdapterDescriptor, label: &Label) -> Option<usize> {
    let classes = descriptor.num_classes;
    match label {
        Label::Index(i) => usize::try_from(*i).ok().filter(|i| *i < classes),
        Label::Score(s) if s.fract() == 0.0 && *s >= 0.0 && *s < classes as f64 => {
            Some(*s as usize)
        }
        Label::Score(_) => None,
        Label::Name(n) => descriptor.class_labels.iter().position(|c| c == n),
    }
}

fn expected_values(descriptor: &AdapterDescriptor) -> String {
    if descriptor.class_labels.is_empty() {
        format!("0..{}", descriptor.num_classes)
    } else {
        descriptor.class_labels.join(", ")
    }
}
