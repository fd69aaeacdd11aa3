use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use rustc_hash::FxHashMap;

use crate::atom::Atom;
use crate::collector;
use crate::env::Env;
use crate::error::{CallError, HostError};
use crate::resource::{self, OpenMode, ResourceDtor, ResourceType};
use crate::term::Term;

/// Host calling convention for native functions.
///
/// A function either returns its result, or calls [`Env::raise_exception`]
/// and returns the placeholder that produced.
pub type NifFn = Arc<dyn Fn(&Env, &[Term]) -> Term + Send + Sync>;

/// Scheduling hint. Carried with the function, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NifFlags {
    #[default]
    Normal,
    DirtyCpu,
    DirtyIo,
}

#[derive(Clone)]
pub struct NifEntry {
    pub name: String,
    pub arity: usize,
    pub flags: NifFlags,
    pub fun: NifFn,
}

impl NifEntry {
    pub fn new<F>(name: impl Into<String>, arity: usize, flags: NifFlags, fun: F) -> Self
    where
        F: Fn(&Env, &[Term]) -> Term + Send + Sync + 'static,
    {
        NifEntry {
            name: name.into(),
            arity,
            flags,
            fun: Arc::new(fun),
        }
    }
}

impl fmt::Debug for NifEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NifEntry({}/{}, {:?})", self.name, self.arity, self.flags)
    }
}

/// What a load callback may touch.
pub struct LoadEnv {
    module: Atom,
    env: Env,
}

impl LoadEnv {
    pub fn module(&self) -> Atom {
        self.module
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Opens a resource type owned by the module being loaded.
    pub fn open_resource_type(
        &self,
        name: &str,
        dtor: Option<ResourceDtor>,
        mode: OpenMode,
    ) -> Result<Arc<ResourceType>, HostError> {
        resource::open_resource_type(self.module, name, dtor, mode)
    }
}

pub type LoadFn = Box<dyn FnOnce(&LoadEnv) -> Result<(), String> + Send>;

/// Everything the host needs to load a native module.
pub struct ModuleDef {
    pub name: String,
    pub entries: Vec<NifEntry>,
    pub load: Option<LoadFn>,
}

/// Loads `def`: checks its function table, then runs its load callback.
pub fn load_module(def: ModuleDef) -> Result<LoadedModule, HostError> {
    let ModuleDef { name, entries, load } = def;

    let mut functions = FxHashMap::default();
    for entry in entries {
        let key = (entry.name.clone(), entry.arity);
        if functions.contains_key(&key) {
            return Err(HostError::DuplicateFunction {
                module: name,
                name: entry.name,
                arity: entry.arity,
            });
        }
        functions.insert(key, entry);
    }

    let module = Atom::try_new(&name)?;
    if let Some(load) = load {
        let load_env = LoadEnv {
            module,
            env: Env::alloc(),
        };
        load(&load_env).map_err(|reason| HostError::LoadFailed {
            module: name.clone(),
            reason,
        })?;
    }

    debug!("Loaded native module {} with {} functions", name, functions.len());
    Ok(LoadedModule {
        name: module,
        functions,
    })
}

/// A native module the host can call into.
pub struct LoadedModule {
    name: Atom,
    functions: FxHashMap<(String, usize), NifEntry>,
}

impl LoadedModule {
    pub fn name(&self) -> Atom {
        self.name
    }

    /// Name and arity of every exported function, sorted.
    pub fn functions(&self) -> Vec<(&str, usize)> {
        let mut list: Vec<_> = self
            .functions
            .keys()
            .map(|(name, arity)| (name.as_str(), *arity))
            .collect();
        list.sort_unstable();
        list
    }

    pub fn flags(&self, function: &str, arity: usize) -> Option<NifFlags> {
        self.functions
            .get(&(function.to_owned(), arity))
            .map(|entry| entry.flags)
    }

    /// Calls `function` with `args` on behalf of `caller`.
    ///
    /// Arguments are copied into a fresh call environment, and the function
    /// runs inside a scheduler context for it. The result or raised reason is
    /// copied back into `caller`.
    pub fn call(&self, caller: &Env, function: &str, args: &[Term]) -> Result<Term, CallError> {
        let entry = self
            .functions
            .get(&(function.to_owned(), args.len()))
            .ok_or_else(|| CallError::Undefined {
                module: self.name,
                function: function.to_owned(),
                arity: args.len(),
            })?;

        let env = Env::for_call(caller.owner());
        let result = {
            let _guard = collector::enter(&env);
            let args: Vec<Term> = args.iter().map(|arg| env.copy(arg)).collect();
            trace!("Calling {}:{}/{}", self.name, entry.name, entry.arity);
            (entry.fun)(&env, &args)
        };

        match env.take_exception() {
            Some(reason) => {
                trace!("{}:{}/{} raised {}", self.name, entry.name, entry.arity, reason);
                Err(CallError::Raised {
                    reason: caller.copy(&reason),
                })
            }
            None => Ok(caller.copy(&result)),
        }
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("functions", &self.functions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_entry() -> NifEntry {
        NifEntry::new("add", 2, NifFlags::Normal, |env, args| {
            match (args[0].as_integer(), args[1].as_integer()) {
                (Some(a), Some(b)) => env.make_integer(a + b),
                _ => env.make_badarg(),
            }
        })
    }

    fn test_module(name: &str) -> LoadedModule {
        let _ = env_logger::builder().is_test(true).try_init();
        load_module(ModuleDef {
            name: name.to_owned(),
            entries: vec![add_entry()],
            load: None,
        })
        .expect("module loads")
    }

    #[test]
    fn test_call_returns_result_in_caller_env() {
        let module = test_module("module_tests_call");
        let caller = Env::alloc();
        let result = module
            .call(&caller, "add", &[caller.make_integer(1), caller.make_integer(2)])
            .expect("call succeeds");
        assert!(result.is_bound_to(&caller));
        assert_eq!(result.as_integer(), Some(3));
    }

    #[test]
    fn test_call_raise() {
        let module = test_module("module_tests_raise");
        let caller = Env::alloc();
        let err = module
            .call(&caller, "add", &[caller.make_integer(1), caller.make_float(2.0)])
            .expect_err("raises");
        let reason = err.reason().expect("a raise");
        assert!(reason.is_bound_to(&caller));
        assert_eq!(reason.as_atom(), Some(Atom::new("badarg")));
    }

    #[test]
    fn test_undefined_function() {
        let module = test_module("module_tests_undefined");
        let caller = Env::alloc();
        let err = module
            .call(&caller, "add", &[caller.make_integer(1)])
            .expect_err("wrong arity");
        assert!(matches!(err, CallError::Undefined { arity: 1, .. }));
    }

    #[test]
    fn test_duplicate_functions_rejected() {
        let result = load_module(ModuleDef {
            name: "module_tests_duplicate".to_owned(),
            entries: vec![add_entry(), add_entry()],
            load: None,
        });
        assert!(matches!(result, Err(HostError::DuplicateFunction { arity: 2, .. })));
    }

    #[test]
    fn test_load_callback_failure() {
        let result = load_module(ModuleDef {
            name: "module_tests_load_failure".to_owned(),
            entries: Vec::new(),
            load: Some(Box::new(|_| Err("not today".to_owned()))),
        });
        assert!(matches!(
            result,
            Err(HostError::LoadFailed { reason, .. }) if reason == "not today"
        ));
    }

    #[test]
    fn test_load_callback_opens_resource_types() {
        let module = load_module(ModuleDef {
            name: "module_tests_load_resources".to_owned(),
            entries: vec![add_entry()],
            load: Some(Box::new(|load_env| {
                load_env
                    .open_resource_type("Counter", None, OpenMode::Create)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })),
        })
        .expect("module loads");
        assert_eq!(module.functions(), vec![("add", 2)]);
        assert_eq!(module.flags("add", 2), Some(NifFlags::Normal));
    }

    #[test]
    fn test_call_runs_in_scheduler_context() {
        let module = load_module(ModuleDef {
            name: "module_tests_context".to_owned(),
            entries: vec![NifEntry::new("scheduler_check", 0, NifFlags::DirtyCpu, |env, _| {
                let inside = collector::current_env().is_some_and(|cur| cur.ptr_eq(env));
                env.make_atom(Atom::new(if inside { "true" } else { "false" }))
            })],
            load: None,
        })
        .expect("module loads");
        let caller = Env::alloc();
        let result = module.call(&caller, "scheduler_check", &[]).expect("call succeeds");
        assert_eq!(result.as_atom(), Some(Atom::new("true")));
    }
}
