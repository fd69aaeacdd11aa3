use std::any::{self, TypeId};

use ferrule_host::{
    load_module, HostError, LoadEnv, LoadedModule, ModuleDef, NifEntry, NifFlags, OpenMode,
    ResourceDtor,
};
use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::config::{BridgeConfig, ReloadPolicy};
use crate::dispatch::{self, NifFunction};
use crate::registry::{self, Registry};
use crate::resource::{destructor_trampoline, Resource};

struct ResourceDecl {
    type_id: TypeId,
    type_name: &'static str,
    name: String,
    dtor: Option<ResourceDtor>,
}

/// Builder for the native module a process loads once.
///
/// ```ignore
/// NifModule::new("Elixir.FineTest.NIF")
///     .resource::<TestResource>("TestResource")
///     .function("add", add)
///     .load()?;
/// ```
pub struct NifModule {
    name: String,
    config: BridgeConfig,
    resources: Vec<ResourceDecl>,
    entries: Vec<NifEntry>,
}

impl NifModule {
    pub fn new(name: impl Into<String>) -> Self {
        NifModule {
            name: name.into(),
            config: BridgeConfig::default(),
            resources: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers `T` as a resource type called `name`.
    pub fn resource<T: Resource>(mut self, name: &str) -> Self {
        let dtor: Option<ResourceDtor> = if T::IMPLEMENTS_DESTRUCTOR {
            Some(destructor_trampoline::<T> as ResourceDtor)
        } else {
            None
        };
        self.resources.push(ResourceDecl {
            type_id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
            name: name.to_owned(),
            dtor,
        });
        self
    }

    /// Exports `fun` as `name`, with the arity of its signature.
    pub fn function<F, Args>(self, name: &str, fun: F) -> Self
    where
        F: NifFunction<Args>,
        Args: 'static,
    {
        self.function_with_flags(name, NifFlags::Normal, fun)
    }

    pub fn function_with_flags<F, Args>(mut self, name: &str, flags: NifFlags, fun: F) -> Self
    where
        F: NifFunction<Args>,
        Args: 'static,
    {
        let entry = NifEntry::new(name, F::ARITY, flags, dispatch::host_fn(name.to_owned(), fun));
        self.entries.push(entry);
        self
    }

    /// The host-level definition: function table plus a load callback that
    /// opens the resource types and fills the registry.
    pub fn into_definition(self) -> ModuleDef {
        let NifModule {
            name,
            config,
            resources,
            entries,
        } = self;
        ModuleDef {
            name,
            entries,
            load: Some(Box::new(move |load_env: &LoadEnv| {
                on_load(load_env, config, resources)
            })),
        }
    }

    pub fn load(self) -> Result<LoadedModule, HostError> {
        load_module(self.into_definition())
    }
}

fn on_load(
    load_env: &LoadEnv,
    config: BridgeConfig,
    resources: Vec<ResourceDecl>,
) -> Result<(), String> {
    if let Some(existing) = registry::get() {
        return match config.reload {
            ReloadPolicy::Reject => {
                warn!(
                    "Rejecting load of {}: {} is already initialized",
                    load_env.module(),
                    existing.module
                );
                Err(format!("bridge already initialized by {}", existing.module))
            }
            ReloadPolicy::KeepExisting => {
                for decl in &resources {
                    let retyped = existing.resources.iter().any(|(type_id, rtype)| {
                        rtype.module() == load_env.module()
                            && rtype.name() == decl.name
                            && *type_id != decl.type_id
                    });
                    if retyped {
                        warn!(
                            "Rejecting reload of {}: resource type {} now holds {}",
                            load_env.module(),
                            decl.name,
                            decl.type_name
                        );
                        return Err(format!(
                            "resource type {} was registered for a different native type",
                            decl.name
                        ));
                    }
                }
                warn!(
                    "Reloading {}: keeping the registry of {}",
                    load_env.module(),
                    existing.module
                );
                for decl in &resources {
                    load_env
                        .open_resource_type(&decl.name, decl.dtor, OpenMode::Takeover)
                        .map_err(|e| e.to_string())?;
                }
                Ok(())
            }
        };
    }

    let mut types = FxHashMap::default();
    for decl in resources {
        let rtype = load_env
            .open_resource_type(&decl.name, decl.dtor, OpenMode::Create)
            .map_err(|e| e.to_string())?;
        debug!("Registered {} as resource type {}", decl.type_name, decl.name);
        types.insert(decl.type_id, rtype);
    }

    let registry = Registry {
        module: load_env.module(),
        resources: types,
        config,
    };
    registry::initialize(registry)
        .map_err(|lost| format!("bridge initialized concurrently with {}", lost.module))?;
    debug!("Initialized bridge for {}", load_env.module());
    Ok(())
}
