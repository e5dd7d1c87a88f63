//! Adapter registry: resolves adapter names to loaded handles
//!
//! Adapters are constructed lazily on first resolution and cached. Each
//! name has its own `OnceCell`, so concurrent first resolutions construct
//! the adapter exactly once.

use crate::config::{AdapterSpec, HostConfig, Lifecycle};
use crate::contract::{AdapterFactory, ClassifierAdapter};
use crate::handle::{panic_message, AdapterHandle, Instances, LoadedAdapter, Slot};
use crate::telemetry;
use parking_lot::{Mutex, RwLock};
use scorehost_core::{AdapterDescriptor, Batch, Capabilities, Capability, Error, Instance, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Registry of adapter factories, adapter specs and loaded handles
pub struct AdapterRegistry {
    config: RwLock<HostConfig>,
    factories: RwLock<HashMap<String, Arc<dyn AdapterFactory>>>,
    handles: Mutex<HashMap<String, Arc<OnceCell<AdapterHandle>>>>,
}

/// An instance fresh out of its factory, with what it declared
struct Built {
    adapter: Box<dyn ClassifierAdapter>,
    descriptor: AdapterDescriptor,
    capabilities: Capabilities,
}

impl AdapterRegistry {
    /// Create a registry from configuration, with no factories registered
    pub fn new(config: HostConfig) -> Self {
        Self {
            config: RwLock::new(config),
            factories: RwLock::new(HashMap::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Create a registry from a host configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(HostConfig::from_file(path)?))
    }

    /// Register a factory under its implementation name.
    ///
    /// A factory with the same name is replaced; already loaded adapters
    /// keep the instances they were built with.
    pub fn register_factory(&self, factory: Arc<dyn AdapterFactory>) {
        let name = factory.name().to_string();
        debug!("Registering adapter factory '{}'", name);
        self.factories.write().insert(name, factory);
    }

    /// Add or replace a named adapter spec. A cached handle for the name
    /// is evicted so the next resolution uses the new spec.
    pub fn register_adapter(&self, name: impl Into<String>, spec: AdapterSpec) -> Result<()> {
        let name = name.into();
        spec.validate(&name)?;
        self.config.write().adapters.insert(name.clone(), spec);
        self.evict(&name);
        Ok(())
    }

    /// Resolve an adapter by name, loading it on first access
    pub async fn resolve(&self, name: &str) -> Result<AdapterHandle> {
        if self.config.read().get_adapter(name).is_none() {
            return Err(Error::adapter_load(name, "no adapter configured under this name"));
        }

        let cell = {
            let mut handles = self.handles.lock();
            Arc::clone(handles.entry(name.to_string()).or_default())
        };

        if let Some(handle) = cell.get() {
            return Ok(handle.clone());
        }

        let handle = cell.get_or_try_init(|| self.load(name)).await?;
        Ok(handle.clone())
    }

    /// Load the named adapters ahead of the first call
    pub async fn preload(&self, names: &[String]) -> Result<()> {
        futures::future::try_join_all(names.iter().map(|name| self.resolve(name))).await?;
        Ok(())
    }

    /// Drop the cached handle for `name`. Its instances are released once
    /// in-flight calls holding the handle complete.
    pub fn evict(&self, name: &str) -> bool {
        let removed = self.handles.lock().remove(name);
        let was_loaded = removed.map_or(false, |cell| cell.initialized());
        if was_loaded {
            info!("Evicted adapter '{}'", name);
        }
        was_loaded
    }

    /// Drop every cached handle
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.handles.lock().drain().collect();
        let loaded = drained.iter().filter(|(_, cell)| cell.initialized()).count();
        info!("Released {} loaded adapters", loaded);
    }

    /// Names of every configured adapter, sorted
    pub fn available_adapters(&self) -> Vec<String> {
        let mut names = self.config.read().adapter_names();
        names.sort();
        names
    }

    /// Names of adapters currently loaded, sorted
    pub fn loaded_adapters(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handles
            .lock()
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Names of registered factories, sorted
    pub fn implementations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    async fn load(&self, name: &str) -> Result<AdapterHandle> {
        let (spec, timeout, verify) = {
            let config = self.config.read();
            let spec = config
                .get_adapter(name)
                .cloned()
                .ok_or_else(|| Error::adapter_load(name, "no adapter configured under this name"))?;
            let timeout = config.timeout_for(&spec);
            (spec, timeout, config.verify_on_load)
        };

        let factory = self
            .factories
            .read()
            .get(&spec.implementation)
            .cloned()
            .ok_or_else(|| {
                Error::adapter_load(
                    name,
                    format!("unknown implementation '{}'", spec.implementation),
                )
            })?;

        info!(
            "Loading adapter '{}' (implementation '{}', {:?})",
            name, spec.implementation, spec.lifecycle
        );

        let first = build(name, &factory, &spec, verify).await?;
        let descriptor = first.descriptor.clone();
        let capabilities = first.capabilities;

        let instances = match spec.lifecycle {
            Lifecycle::Singleton => Instances::Shared {
                slots: vec![Slot::new(first.adapter)],
                cursor: AtomicUsize::new(0),
            },
            Lifecycle::Pool { size } => {
                let mut slots = Vec::with_capacity(size);
                slots.push(Slot::new(first.adapter));
                for _ in 1..size {
                    let next = build(name, &factory, &spec, false).await?;
                    if next.capabilities != capabilities {
                        return Err(Error::contract(
                            name,
                            "pooled instances declare different capabilities",
                        ));
                    }
                    slots.push(Slot::new(next.adapter));
                }
                Instances::Shared {
                    slots,
                    cursor: AtomicUsize::new(0),
                }
            }
            Lifecycle::PerCall => {
                // The first instance only served to read declarations.
                drop(first.adapter);
                Instances::PerCall {
                    factory: Arc::clone(&factory),
                    params: spec.params.clone(),
                }
            }
        };

        info!(
            "Loaded adapter '{}': {} features ({:?}), {} classes, capabilities {:?}",
            name,
            descriptor
                .num_features
                .map_or_else(|| "any".to_string(), |n| n.to_string()),
            descriptor.schema_policy,
            descriptor.num_classes,
            capabilities
        );

        Ok(AdapterHandle::new(LoadedAdapter {
            name: name.to_string(),
            descriptor,
            capabilities,
            distribution_policy: spec.distribution_policy,
            lifecycle: spec.lifecycle,
            timeout,
            instances,
        }))
    }
}

/// Construct, inspect and optionally exercise one instance on the blocking pool
async fn build(
    name: &str,
    factory: &Arc<dyn AdapterFactory>,
    spec: &AdapterSpec,
    verify: bool,
) -> Result<Built> {
    let factory = Arc::clone(factory);
    let spec = spec.clone();
    let task_name = name.to_string();

    let joined =
        tokio::task::spawn_blocking(move || build_blocking(&task_name, &*factory, &spec, verify))
            .await;

    let built = match joined {
        Ok(built) => built?,
        Err(e) if e.is_panic() => {
            let reason = panic_message(e.into_panic());
            return Err(Error::adapter_load(
                name,
                format!("adapter panicked during construction: {}", reason),
            ));
        }
        Err(e) => {
            return Err(Error::adapter_load(
                name,
                format!("construction task failed: {}", e),
            ))
        }
    };

    metrics::counter!(telemetry::ADAPTERS_LOADED_TOTAL, "adapter" => name.to_string())
        .increment(1);
    Ok(built)
}

fn build_blocking(
    name: &str,
    factory: &dyn AdapterFactory,
    spec: &AdapterSpec,
    verify: bool,
) -> Result<Built> {
    let mut adapter = factory
        .create(&spec.params)
        .map_err(|e| Error::adapter_load(name, format!("{:#}", e)))?;

    let descriptor = spec.merge_descriptor(adapter.descriptor());
    let capabilities = adapter.capabilities();

    if capabilities.is_empty() {
        return Err(Error::contract(
            name,
            "adapter declares neither classify nor getClassDistribution",
        ));
    }
    if descriptor.num_classes == 0 {
        return Err(Error::contract(name, "adapter declares zero classes"));
    }

    if verify {
        match descriptor.num_features {
            Some(width) => {
                verify_instance(name, adapter.as_mut(), &descriptor, capabilities, width)?
            }
            None => warn!("Skipping load-time check for '{}': no declared feature count", name),
        }
    }

    Ok(Built {
        adapter,
        descriptor,
        capabilities,
    })
}

/// Exercise a fresh instance with one all-zero instance per declared operation
fn verify_instance(
    name: &str,
    adapter: &mut dyn ClassifierAdapter,
    descriptor: &AdapterDescriptor,
    capabilities: Capabilities,
    width: usize,
) -> Result<()> {
    let batch = Batch::new(vec![Instance::numeric(vec![0.0; width])]);
    debug!("Exercising adapter '{}' with a {}-feature instance", name, width);

    let failed = |capability: Capability, e: anyhow::Error| {
        Error::adapter_load(name, format!("load-time {} failed: {:#}", capability, e))
    };

    for capability in capabilities.iter() {
        match capability {
            Capability::Classify => {
                let labels = adapter.classify(&batch).map_err(|e| failed(capability, e))?;
                if labels.len() != 1 {
                    return Err(Error::contract(
                        name,
                        format!(
                            "load-time classify returned {} labels for 1 instance",
                            labels.len()
                        ),
                    ));
                }
            }
            Capability::ClassDistribution => {
                let vectors = adapter
                    .class_distribution(&batch)
                    .map_err(|e| failed(capability, e))?;
                if vectors.len() != 1 || vectors[0].len() != descriptor.num_classes {
                    let widths: Vec<usize> = vectors.iter().map(Vec::len).collect();
                    return Err(Error::contract(
                        name,
                        format!(
                            "load-time getClassDistribution returned {} vectors of widths {:?}, \
                             expected 1 of width {}",
                            vectors.len(),
                            widths,
                            descriptor.num_classes
                        ),
                    ));
                }
            }
        }
    }

    Ok(())
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.available_adapters())
            .field("implementations", &self.implementations())
            .field("loaded", &self.loaded_adapters())
            .finish()
    }
}

/// Builder for an adapter registry with convenience methods
pub struct RegistryBuilder {
    config: HostConfig,
    config_path: Option<String>,
    factories: Vec<Arc<dyn AdapterFactory>>,
    builtins: bool,
    preload: Vec<String>,
}

impl RegistryBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: HostConfig::default(),
            config_path: None,
            factories: Vec::new(),
            builtins: false,
            preload: Vec::new(),
        }
    }

    /// Use an in-memory configuration
    pub fn with_config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Read configuration from a YAML file at build time
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Add a named adapter spec
    pub fn with_adapter(mut self, name: impl Into<String>, spec: AdapterSpec) -> Self {
        self.config.adapters.insert(name.into(), spec);
        self
    }

    /// Register a factory
    pub fn with_factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Register the built-in reference adapters
    #[cfg(feature = "builtin-adapters")]
    pub fn with_builtins(mut self) -> Self {
        self.builtins = true;
        self
    }

    /// Exercise adapters with a synthetic instance when they are loaded
    pub fn verify_on_load(mut self, enabled: bool) -> Self {
        self.config.verify_on_load = enabled;
        self
    }

    /// Add an adapter to preload
    pub fn preload(mut self, name: impl Into<String>) -> Self {
        self.preload.push(name.into());
        self
    }

    /// Build the registry
    pub async fn build(self) -> Result<AdapterRegistry> {
        let config = match self.config_path {
            Some(path) => {
                let mut loaded = HostConfig::from_file(&path)?;
                loaded.adapters.extend(self.config.adapters);
                loaded.verify_on_load |= self.config.verify_on_load;
                loaded
            }
            None => self.config,
        };
        config.validate()?;

        let registry = AdapterRegistry::new(config);

        #[cfg(feature = "builtin-adapters")]
        if self.builtins {
            crate::builtin::register_all(&registry);
        }

        for factory in self.factories {
            registry.register_factory(factory);
        }

        if !self.preload.is_empty() {
            registry.preload(&self.preload).await?;
        }

        Ok(registry)
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
