use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::atom::Atom;
use crate::env::{Env, EnvId};
use crate::process::Pid;
use crate::resource::ResourceHandle;

/// Shared, immutable node of a term tree. Children carry no environment;
/// only the top-level [`Term`] handle does.
pub type TermRef = Arc<TermValue>;

/// A host value.
///
/// Integers are stored as `i128`, wide enough for every native integer width
/// plus the out-of-range values codecs must reject.
#[derive(Clone)]
pub enum TermValue {
    Integer(i128),
    Float(f64),
    Atom(Atom),
    Pid(Pid),
    Resource(ResourceHandle),
    Tuple(Vec<TermRef>),
    /// Insertion ordered; equality ignores order.
    Map(IndexMap<TermRef, TermRef>),
    List(Vec<TermRef>),
    Binary(Arc<[u8]>),
}

/// Coarse classification of a term, used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKind {
    Integer,
    Float,
    Atom,
    Pid,
    Resource,
    Tuple,
    Map,
    List,
    Binary,
}

impl fmt::Display for TermKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TermKind::Integer => "an integer",
            TermKind::Float => "a float",
            TermKind::Atom => "an atom",
            TermKind::Pid => "a pid",
            TermKind::Resource => "a resource",
            TermKind::Tuple => "a tuple",
            TermKind::Map => "a map",
            TermKind::List => "a list",
            TermKind::Binary => "a binary",
        };
        f.write_str(text)
    }
}

impl TermValue {
    pub fn kind(&self) -> TermKind {
        match self {
            TermValue::Integer(_) => TermKind::Integer,
            TermValue::Float(_) => TermKind::Float,
            TermValue::Atom(_) => TermKind::Atom,
            TermValue::Pid(_) => TermKind::Pid,
            TermValue::Resource(_) => TermKind::Resource,
            TermValue::Tuple(_) => TermKind::Tuple,
            TermValue::Map(_) => TermKind::Map,
            TermValue::List(_) => TermKind::List,
            TermValue::Binary(_) => TermKind::Binary,
        }
    }
}

impl PartialEq for TermValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TermValue::Integer(a), TermValue::Integer(b)) => a == b,
            // Exact equality: 1.0 and 1 differ, and so do 0.0 and -0.0.
            (TermValue::Float(a), TermValue::Float(b)) => a.to_bits() == b.to_bits(),
            (TermValue::Atom(a), TermValue::Atom(b)) => a == b,
            (TermValue::Pid(a), TermValue::Pid(b)) => a == b,
            (TermValue::Resource(a), TermValue::Resource(b)) => ResourceHandle::ptr_eq(a, b),
            (TermValue::Tuple(a), TermValue::Tuple(b)) => a == b,
            (TermValue::Map(a), TermValue::Map(b)) => a == b,
            (TermValue::List(a), TermValue::List(b)) => a == b,
            (TermValue::Binary(a), TermValue::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TermValue {}

impl Hash for TermValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            TermValue::Integer(v) => v.hash(state),
            TermValue::Float(v) => v.to_bits().hash(state),
            TermValue::Atom(a) => a.hash(state),
            TermValue::Pid(p) => p.hash(state),
            TermValue::Resource(r) => r.address().hash(state),
            TermValue::Tuple(items) | TermValue::List(items) => items.hash(state),
            // Order-independent equality means only the size can be hashed.
            TermValue::Map(entries) => entries.len().hash(state),
            TermValue::Binary(bytes) => bytes.hash(state),
        }
    }
}

fn write_sequence(f: &mut fmt::Formatter<'_>, items: &[TermRef]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermValue::Integer(v) => write!(f, "{}", v),
            TermValue::Float(v) => write!(f, "{:?}", v),
            TermValue::Atom(a) => write!(f, "{}", a),
            TermValue::Pid(p) => write!(f, "{}", p),
            TermValue::Resource(r) => write!(f, "#Ref<{}.{:#x}>", r.resource_type().name(), r.address()),
            TermValue::Tuple(items) => {
                f.write_str("{")?;
                write_sequence(f, items)?;
                f.write_str("}")
            }
            TermValue::List(items) => {
                f.write_str("[")?;
                write_sequence(f, items)?;
                f.write_str("]")
            }
            TermValue::Map(entries) => {
                f.write_str("#{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} => {}", key, value)?;
                }
                f.write_str("}")
            }
            TermValue::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => write!(f, "<<\"{}\">>", text.escape_default()),
                Err(_) => {
                    f.write_str("<<")?;
                    for (i, byte) in bytes.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{}", byte)?;
                    }
                    f.write_str(">>")
                }
            },
        }
    }
}

impl fmt::Debug for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Handle to a host value bound to the environment that produced it.
///
/// Handles are cheap to clone. They compare by value, regardless of the
/// environment they are bound to.
#[derive(Clone)]
pub struct Term {
    env: EnvId,
    value: TermRef,
}

impl Term {
    pub(crate) fn new(env: EnvId, value: TermValue) -> Self {
        Term { env, value: Arc::new(value) }
    }

    pub(crate) fn from_shared(env: EnvId, value: TermRef) -> Self {
        Term { env, value }
    }

    pub(crate) fn shared(&self) -> &TermRef {
        &self.value
    }

    /// Id of the environment this handle is bound to.
    pub fn env_id(&self) -> EnvId {
        self.env
    }

    /// True if this handle may be used with `env`.
    pub fn is_bound_to(&self, env: &Env) -> bool {
        self.env == env.id()
    }

    pub fn value(&self) -> &TermValue {
        &self.value
    }

    pub fn kind(&self) -> TermKind {
        self.value.kind()
    }

    pub fn as_integer(&self) -> Option<i128> {
        match *self.value {
            TermValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self.value {
            TermValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<Atom> {
        match *self.value {
            TermValue::Atom(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_pid(&self) -> Option<Pid> {
        match *self.value {
            TermValue::Pid(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match &*self.value {
            TermValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceHandle> {
        match &*self.value {
            TermValue::Resource(handle) => Some(handle),
            _ => None,
        }
    }

    /// Elements of a tuple, bound to this handle's environment.
    pub fn tuple_elements(&self) -> Option<Vec<Term>> {
        match &*self.value {
            TermValue::Tuple(items) => Some(self.rebind_all(items)),
            _ => None,
        }
    }

    /// Elements of a list, bound to this handle's environment.
    pub fn list_elements(&self) -> Option<Vec<Term>> {
        match &*self.value {
            TermValue::List(items) => Some(self.rebind_all(items)),
            _ => None,
        }
    }

    /// Entries of a map in insertion order.
    pub fn map_entries(&self) -> Option<Vec<(Term, Term)>> {
        match &*self.value {
            TermValue::Map(entries) => Some(
                entries
                    .iter()
                    .map(|(k, v)| (self.rebind(k), self.rebind(v)))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Looks `key` up in a map. `None` if this is not a map or the key is absent.
    pub fn map_get(&self, key: &Term) -> Option<Term> {
        match &*self.value {
            TermValue::Map(entries) => entries.get(key.shared()).map(|v| self.rebind(v)),
            _ => None,
        }
    }

    /// Number of entries if this is a map.
    pub fn map_size(&self) -> Option<usize> {
        match &*self.value {
            TermValue::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    fn rebind(&self, value: &TermRef) -> Term {
        Term::from_shared(self.env, Arc::clone(value))
    }

    fn rebind_all(&self, items: &[TermRef]) -> Vec<Term> {
        items.iter().map(|item| self.rebind(item)).collect()
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Term {}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.value, f)
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Term({} @ {:?})", self.value, self.env)
    }
}
