//! Loaded adapters and serialized access to their instances
//!
//! Every adapter instance sits behind its own `tokio::sync::Mutex`. An
//! invocation holds the owned guard for the full duration of the adapter
//! call, which runs on the blocking pool, so no two calls ever touch the
//! same instance at once. Pools spread calls over several instances;
//! per-call handles construct a fresh instance inside the invocation.

use crate::config::Lifecycle;
use crate::contract::{AdapterFactory, AdapterParams, ClassifierAdapter};
use crate::normalize::DistributionPolicy;
use scorehost_core::{AdapterDescriptor, Capabilities, Error, Result};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

type SharedAdapter = Arc<Mutex<Box<dyn ClassifierAdapter>>>;

/// One constructed adapter instance
pub(crate) struct Slot {
    id: Uuid,
    adapter: SharedAdapter,
}

impl Slot {
    pub(crate) fn new(adapter: Box<dyn ClassifierAdapter>) -> Self {
        Self {
            id: Uuid::new_v4(),
            adapter: Arc::new(Mutex::new(adapter)),
        }
    }
}

pub(crate) enum Instances {
    /// Long-lived instances (one for a singleton), handed out round-robin
    Shared { slots: Vec<Slot>, cursor: AtomicUsize },
    /// Constructed for each call
    PerCall {
        factory: Arc<dyn AdapterFactory>,
        params: AdapterParams,
    },
}

/// Resolved state of one named adapter
pub(crate) struct LoadedAdapter {
    pub(crate) name: String,
    pub(crate) descriptor: AdapterDescriptor,
    pub(crate) capabilities: Capabilities,
    pub(crate) distribution_policy: DistributionPolicy,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) timeout: Option<Duration>,
    pub(crate) instances: Instances,
}

/// Cheaply clonable handle to a loaded adapter.
///
/// Dropping the last clone (after the registry evicted it and in-flight
/// calls finished) drops the adapter instances and whatever resources they
/// hold.
#[derive(Clone)]
pub struct AdapterHandle {
    inner: Arc<LoadedAdapter>,
}

enum Lease {
    Shared {
        id: Uuid,
        guard: OwnedMutexGuard<Box<dyn ClassifierAdapter>>,
    },
    Fresh {
        factory: Arc<dyn AdapterFactory>,
        params: AdapterParams,
    },
}

impl AdapterHandle {
    pub(crate) fn new(loaded: LoadedAdapter) -> Self {
        Self {
            inner: Arc::new(loaded),
        }
    }

    /// Adapter name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Effective descriptor (declared, with configured overrides applied)
    pub fn descriptor(&self) -> &AdapterDescriptor {
        &self.inner.descriptor
    }

    /// Capabilities declared at load time
    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    /// Check applied to returned distributions
    pub fn distribution_policy(&self) -> DistributionPolicy {
        self.inner.distribution_policy
    }

    /// Instance management policy
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle
    }

    /// Configured per-call deadline
    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Ids of the long-lived instances (empty for per-call adapters)
    pub fn instance_ids(&self) -> Vec<Uuid> {
        match &self.inner.instances {
            Instances::Shared { slots, .. } => slots.iter().map(|s| s.id).collect(),
            Instances::PerCall { .. } => Vec::new(),
        }
    }

    async fn checkout(&self) -> Lease {
        match &self.inner.instances {
            Instances::Shared { slots, cursor } => {
                let slot = &slots[cursor.fetch_add(1, Ordering::Relaxed) % slots.len()];
                let guard = Arc::clone(&slot.adapter).lock_owned().await;
                Lease::Shared { id: slot.id, guard }
            }
            Instances::PerCall { factory, params } => Lease::Fresh {
                factory: Arc::clone(factory),
                params: params.clone(),
            },
        }
    }

    /// Run `op` against one instance of this adapter.
    ///
    /// The outer result carries harness-level failures (deadline exceeded,
    /// adapter panic, per-call construction failure); the inner one is the
    /// adapter's own answer. `deadline` covers waiting for the instance as
    /// well as the call itself.
    pub(crate) async fn invoke<T, F>(
        &self,
        deadline: Option<Duration>,
        op: F,
    ) -> Result<anyhow::Result<T>>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn ClassifierAdapter) -> anyhow::Result<T> + Send + 'static,
    {
        let name = self.inner.name.clone();

        let work = async {
            let lease = self.checkout().await;
            let task_name = name.clone();

            let joined = tokio::task::spawn_blocking(move || -> Result<anyhow::Result<T>> {
                match lease {
                    Lease::Shared { id, mut guard } => {
                        debug!(adapter = %task_name, instance = %id, "Invoking adapter");
                        Ok(op(&mut **guard))
                    }
                    Lease::Fresh { factory, params } => {
                        let mut adapter = construct(&task_name, &*factory, &params)?;
                        metrics::counter!(
                            crate::telemetry::ADAPTERS_LOADED_TOTAL,
                            "adapter" => task_name.clone()
                        )
                        .increment(1);
                        debug!(adapter = %task_name, "Invoking per-call adapter instance");
                        Ok(op(adapter.as_mut()))
                    }
                }
            })
            .await;

            match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(Error::runtime(
                    &name,
                    format!("adapter panicked: {}", panic_message(e.into_panic())),
                )),
                Err(e) => Err(Error::runtime(&name, format!("adapter task failed: {}", e))),
            }
        };

        match deadline {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| Error::AdapterTimeout {
                    adapter: name.clone(),
                    timeout: limit,
                })?,
            None => work.await,
        }
    }
}

impl fmt::Debug for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterHandle")
            .field("name", &self.inner.name)
            .field("descriptor", &self.inner.descriptor)
            .field("capabilities", &self.inner.capabilities)
            .field("lifecycle", &self.inner.lifecycle)
            .finish()
    }
}

/// Build one instance, reporting a panicking factory as a load failure
fn construct(
    name: &str,
    factory: &dyn AdapterFactory,
    params: &AdapterParams,
) -> Result<Box<dyn ClassifierAdapter>> {
    match panic::catch_unwind(AssertUnwindSafe(|| factory.create(params))) {
        Ok(built) => built.map_err(|e| Error::adapter_load(name, format!("{:#}", e))),
        Err(payload) => Err(Error::adapter_load(
            name,
            format!("adapter panicked during construction: {}", panic_message(payload)),
        )),
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
