use ferrule_host::{Atom, TermKind};
use miette::Diagnostic;
use thiserror::Error;

/// Why a term could not be decoded into a native value.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum DecodeError {
    #[error("expected {expected}, got {found}")]
    #[diagnostic(code(ferrule::decode::shape))]
    Shape {
        expected: &'static str,
        found: TermKind,
    },

    #[error("{value} is out of range for {target}")]
    #[diagnostic(code(ferrule::decode::range))]
    Range { value: String, target: &'static str },

    #[error("expected a tuple of {expected} elements, got {found}")]
    #[diagnostic(code(ferrule::decode::arity))]
    Arity { expected: usize, found: usize },

    #[error("invalid UTF-8 text: {0}")]
    #[diagnostic(code(ferrule::decode::encoding))]
    Encoding(String),

    #[error("expected struct {expected}, got {}", .found.as_deref().unwrap_or("a map without a struct tag"))]
    #[diagnostic(code(ferrule::decode::type_tag))]
    TypeTagMismatch {
        expected: Atom,
        found: Option<String>,
    },

    #[error("struct {module} has no field {field}")]
    #[diagnostic(code(ferrule::decode::missing_field))]
    MissingField { module: Atom, field: &'static str },

    #[error("expected a {expected} resource, got a {found} resource")]
    #[diagnostic(code(ferrule::decode::resource_type))]
    ResourceTypeMismatch { expected: String, found: String },

    #[error("term belongs to a different environment")]
    #[diagnostic(
        code(ferrule::decode::env_mismatch),
        help("copy the term into the calling environment first")
    )]
    EnvMismatch,

    #[error("no variant of {type_name} matches {found}")]
    #[diagnostic(code(ferrule::decode::no_variant))]
    NoVariant {
        type_name: &'static str,
        found: String,
    },

    #[error("element {index}: {error}")]
    #[diagnostic(code(ferrule::decode::element))]
    Element { index: usize, error: Box<DecodeError> },

    #[error("field {field}: {error}")]
    #[diagnostic(code(ferrule::decode::field))]
    Field {
        field: &'static str,
        error: Box<DecodeError>,
    },

    #[error("map entry: {error}")]
    #[diagnostic(code(ferrule::decode::map_entry))]
    MapEntry { error: Box<DecodeError> },
}

impl DecodeError {
    pub(crate) fn in_element(self, index: usize) -> Self {
        DecodeError::Element {
            index,
            error: Box::new(self),
        }
    }

    pub(crate) fn in_field(self, field: &'static str) -> Self {
        DecodeError::Field {
            field,
            error: Box::new(self),
        }
    }

    pub(crate) fn in_map_entry(self) -> Self {
        DecodeError::MapEntry {
            error: Box::new(self),
        }
    }

    /// The innermost error, with context wrappers removed.
    pub fn root(&self) -> &DecodeError {
        match self {
            DecodeError::Element { error, .. }
            | DecodeError::Field { error, .. }
            | DecodeError::MapEntry { error } => error.root(),
            other => other,
        }
    }
}

/// An argument of a native call that failed to decode.
#[derive(Debug, Clone, Error, Diagnostic)]
#[error("could not decode argument {position}: {error}")]
#[diagnostic(code(ferrule::argument))]
pub struct BadArgument {
    /// 1-based position in the argument list.
    pub position: usize,
    pub error: DecodeError,
}

#[derive(Debug, Clone, Error, Diagnostic)]
pub enum ResourceError {
    #[error("resource type {type_name} is not registered by the loaded module")]
    #[diagnostic(
        code(ferrule::resource::unregistered),
        help("declare it with NifModule::resource before loading")
    )]
    Unregistered { type_name: &'static str },
}
