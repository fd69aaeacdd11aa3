//! In-process model of a garbage-collected, process-isolated host runtime.
//!
//! Provides the surface a native bridge consumes: interned atoms, immutable
//! terms bound to environments, lightweight processes with mailboxes,
//! reference-counted resources with destructor callbacks, and native module
//! loading with a `Fn(&Env, &[Term]) -> Term` calling convention.

pub mod atom;
pub mod collector;
pub mod env;
pub mod error;
pub mod module;
pub mod process;
pub mod resource;
pub mod term;

pub use atom::{Atom, MAX_ATOM_CHARS};
pub use env::{Env, EnvId, EnvKind};
pub use error::{CallError, HostError};
pub use module::{load_module, LoadEnv, LoadFn, LoadedModule, ModuleDef, NifEntry, NifFlags, NifFn};
pub use process::{is_alive, send, Message, Pid, Process};
pub use resource::{OpenMode, ResourceDtor, ResourceHandle, ResourceType};
pub use term::{Term, TermKind, TermRef, TermValue};
