//! Write-once state shared by every call into the bridged module.

use std::any::TypeId;
use std::sync::Arc;

use ferrule_host::{Atom, ResourceType};
use once_cell::sync::{Lazy, OnceCell};
use rustc_hash::FxHashMap;

use crate::config::BridgeConfig;

pub(crate) struct Registry {
    pub(crate) module: Atom,
    pub(crate) resources: FxHashMap<TypeId, Arc<ResourceType>>,
    pub(crate) config: BridgeConfig,
}

static REGISTRY: OnceCell<Registry> = OnceCell::new();

static DEFAULT_CONFIG: Lazy<BridgeConfig> = Lazy::new(BridgeConfig::default);

pub(crate) fn get() -> Option<&'static Registry> {
    REGISTRY.get()
}

/// Stores the registry. Fails, handing it back, if one is already stored.
pub(crate) fn initialize(registry: Registry) -> Result<(), Registry> {
    REGISTRY.set(registry)
}

/// The host resource type registered for `T`.
pub fn resource_type<T: 'static>() -> Option<Arc<ResourceType>> {
    REGISTRY
        .get()
        .and_then(|registry| registry.resources.get(&TypeId::of::<T>()))
        .cloned()
}

/// Configuration of the loaded module, or the defaults before loading.
pub fn config() -> &'static BridgeConfig {
    REGISTRY
        .get()
        .map(|registry| &registry.config)
        .unwrap_or_else(|| &*DEFAULT_CONFIG)
}

pub fn is_initialized() -> bool {
    REGISTRY.get().is_some()
}

/// Name of the loaded module.
pub fn module_name() -> Option<Atom> {
    REGISTRY.get().map(|registry| registry.module)
}
