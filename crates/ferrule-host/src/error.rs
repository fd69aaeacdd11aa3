use thiserror::Error;

use crate::atom::Atom;
use crate::term::Term;

/// Errors raised by the host runtime's own API.
#[derive(Error, Debug, Clone)]
pub enum HostError {
    #[error("Atom name has {chars} characters, more than the host allows.")]
    AtomTooLong { chars: usize },

    #[error("Map construction failed: key {0} appears more than once.")]
    DuplicateMapKey(String),

    #[error("Function {name}/{arity} is defined more than once in module {module}.")]
    DuplicateFunction {
        module: String,
        name: String,
        arity: usize,
    },

    #[error("Loading module {module} failed: {reason}")]
    LoadFailed { module: String, reason: String },

    #[error("Resource type {module}:{name} is already open.")]
    ResourceTypeExists { module: Atom, name: String },

    #[error("Resource type {module}:{name} cannot be taken over because it was never opened.")]
    UnknownResourceType { module: Atom, name: String },
}

/// Outcome of a failed call into a loaded native module.
#[derive(Error, Debug, Clone)]
pub enum CallError {
    #[error("undefined function {module}:{function}/{arity}")]
    Undefined {
        module: Atom,
        function: String,
        arity: usize,
    },

    /// The native function raised; `reason` lives in the caller's environment.
    #[error("native function raised {reason}")]
    Raised { reason: Term },
}

impl CallError {
    /// The raised reason, if this is a raise.
    pub fn reason(&self) -> Option<&Term> {
        match self {
            CallError::Raised { reason } => Some(reason),
            CallError::Undefined { .. } => None,
        }
    }
}
