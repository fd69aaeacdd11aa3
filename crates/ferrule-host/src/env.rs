use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::atom::Atom;
use crate::error::HostError;
use crate::process::Pid;
use crate::resource::ResourceHandle;
use crate::term::{Term, TermRef, TermValue};

static NEXT_ENV_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an environment. Never reused within a runtime instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(u64);

impl EnvId {
    fn next() -> Self {
        EnvId(NEXT_ENV_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvKind {
    /// Allocated on demand, owned by no process.
    Independent,
    /// Long-lived environment of a process.
    Process(Pid),
    /// Scoped to one native call made by a process, or by no process.
    Call(Option<Pid>),
    /// Holds a message while it sits in a mailbox.
    Message,
}

struct EnvInner {
    id: EnvId,
    kind: EnvKind,
    pending: Mutex<Option<TermRef>>,
}

/// A context in which terms are created and are valid.
///
/// Terms created through one environment are bound to it; handing them to a
/// different environment requires [`Env::copy`].
#[derive(Clone)]
pub struct Env(Arc<EnvInner>);

impl Env {
    fn with_kind(kind: EnvKind) -> Self {
        Env(Arc::new(EnvInner {
            id: EnvId::next(),
            kind,
            pending: Mutex::new(None),
        }))
    }

    /// Allocates a process-independent environment. Usable from any thread.
    pub fn alloc() -> Self {
        Self::with_kind(EnvKind::Independent)
    }

    pub(crate) fn for_process(pid: Pid) -> Self {
        Self::with_kind(EnvKind::Process(pid))
    }

    pub(crate) fn for_call(owner: Option<Pid>) -> Self {
        Self::with_kind(EnvKind::Call(owner))
    }

    pub(crate) fn for_message() -> Self {
        Self::with_kind(EnvKind::Message)
    }

    pub fn id(&self) -> EnvId {
        self.0.id
    }

    pub fn kind(&self) -> EnvKind {
        self.0.kind
    }

    /// The process this environment belongs to, if any.
    pub fn owner(&self) -> Option<Pid> {
        match self.0.kind {
            EnvKind::Process(pid) | EnvKind::Call(Some(pid)) => Some(pid),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Env) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn term(&self, value: TermValue) -> Term {
        Term::new(self.id(), value)
    }

    pub fn make_integer(&self, value: i128) -> Term {
        self.term(TermValue::Integer(value))
    }

    pub fn make_float(&self, value: f64) -> Term {
        self.term(TermValue::Float(value))
    }

    pub fn make_atom(&self, atom: Atom) -> Term {
        self.term(TermValue::Atom(atom))
    }

    pub fn make_binary(&self, bytes: &[u8]) -> Term {
        self.term(TermValue::Binary(Arc::from(bytes)))
    }

    pub fn make_pid(&self, pid: Pid) -> Term {
        self.term(TermValue::Pid(pid))
    }

    /// Hands the host one more reference to `handle`.
    pub fn make_resource(&self, handle: &ResourceHandle) -> Term {
        self.term(TermValue::Resource(handle.clone()))
    }

    pub fn make_tuple(&self, elements: &[Term]) -> Term {
        self.term(TermValue::Tuple(Self::shared_all(elements)))
    }

    pub fn make_list(&self, elements: &[Term]) -> Term {
        self.term(TermValue::List(Self::shared_all(elements)))
    }

    /// Builds a map from `entries`, keeping their order. Fails if a key repeats.
    pub fn make_map(&self, entries: &[(Term, Term)]) -> Result<Term, HostError> {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
            if map.insert(Arc::clone(key.shared()), Arc::clone(value.shared())).is_some() {
                return Err(HostError::DuplicateMapKey(key.to_string()));
            }
        }
        Ok(self.term(TermValue::Map(map)))
    }

    /// Builds a map from `entries`; a repeated key keeps its first position
    /// and its last value.
    pub fn make_map_overwrite(&self, entries: &[(Term, Term)]) -> Term {
        let map = entries
            .iter()
            .map(|(key, value)| (Arc::clone(key.shared()), Arc::clone(value.shared())))
            .collect();
        self.term(TermValue::Map(map))
    }

    /// Returns a handle to `term` that is bound to this environment.
    pub fn copy(&self, term: &Term) -> Term {
        Term::from_shared(self.id(), Arc::clone(term.shared()))
    }

    /// Marks `reason` as the exception this environment's native call raises.
    ///
    /// The returned term is a placeholder; the caller must return it to the
    /// host unchanged. A later raise replaces an earlier one.
    pub fn raise_exception(&self, reason: &Term) -> Term {
        *self.0.pending.lock() = Some(Arc::clone(reason.shared()));
        self.make_atom(Atom::new("$exception"))
    }

    /// Raises the bare `badarg` atom.
    pub fn make_badarg(&self) -> Term {
        let reason = self.make_atom(Atom::new("badarg"));
        self.raise_exception(&reason)
    }

    pub fn has_pending_exception(&self) -> bool {
        self.0.pending.lock().is_some()
    }

    /// Clears and returns the pending exception reason.
    pub fn take_exception(&self) -> Option<Term> {
        self.0
            .pending
            .lock()
            .take()
            .map(|reason| Term::from_shared(self.id(), reason))
    }

    fn shared_all(elements: &[Term]) -> Vec<TermRef> {
        elements.iter().map(|t| Arc::clone(t.shared())).collect()
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Env")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_ids_are_unique() {
        let a = Env::alloc();
        let b = Env::alloc();
        assert_ne!(a.id(), b.id());
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_terms_bind_to_their_env() {
        let a = Env::alloc();
        let b = Env::alloc();
        let term = a.make_integer(42);
        assert!(term.is_bound_to(&a));
        assert!(!term.is_bound_to(&b));

        let copied = b.copy(&term);
        assert!(copied.is_bound_to(&b));
        assert_eq!(copied, term);
    }

    #[test]
    fn test_make_map_rejects_duplicate_keys() {
        let env = Env::alloc();
        let key = env.make_atom(Atom::new("dup"));
        let result = env.make_map(&[
            (key.clone(), env.make_integer(1)),
            (key, env.make_integer(2)),
        ]);
        assert!(matches!(result, Err(HostError::DuplicateMapKey(_))));
    }

    #[test]
    fn test_make_map_overwrite_keeps_last_value() {
        let env = Env::alloc();
        let key = env.make_atom(Atom::new("dup"));
        let map = env.make_map_overwrite(&[
            (key.clone(), env.make_integer(1)),
            (key.clone(), env.make_integer(2)),
        ]);
        assert_eq!(map.map_size(), Some(1));
        assert_eq!(map.map_get(&key).and_then(|v| v.as_integer()), Some(2));
    }

    #[test]
    fn test_pending_exception() {
        let env = Env::alloc();
        assert!(!env.has_pending_exception());

        let reason = env.make_atom(Atom::new("oops"));
        env.raise_exception(&reason);
        assert!(env.has_pending_exception());
        assert_eq!(env.take_exception(), Some(reason));
        assert!(env.take_exception().is_none());
    }

    #[test]
    fn test_badarg() {
        let env = Env::alloc();
        env.make_badarg();
        let reason = env.take_exception().expect("badarg raised");
        assert_eq!(reason.as_atom(), Some(Atom::new("badarg")));
    }

    #[test]
    fn test_owner() {
        let pid = Pid::from_raw(77);
        assert_eq!(Env::for_process(pid).owner(), Some(pid));
        assert_eq!(Env::for_call(None).owner(), None);
        assert_eq!(Env::alloc().owner(), None);
    }
}
