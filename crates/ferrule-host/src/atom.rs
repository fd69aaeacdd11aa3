use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use string_interner::{DefaultSymbol, StringInterner};

use crate::error::HostError;

/// Longest atom name accepted by [`Atom::try_new`], in characters.
pub const MAX_ATOM_CHARS: usize = 255;

/// Process-wide atom table. Atoms are never freed.
static ATOM_TABLE: Lazy<AtomTable> = Lazy::new(AtomTable::default);

#[derive(Default)]
struct AtomTable {
    interner: RwLock<StringInterner>,
}

impl AtomTable {
    fn intern(&self, name: &str) -> DefaultSymbol {
        // Most lookups hit an existing atom, so try the shared lock first.
        if let Some(symbol) = self.interner.read().get(name) {
            return symbol;
        }
        self.interner.write().get_or_intern(name)
    }

    fn with_name<R>(&self, symbol: DefaultSymbol, f: impl FnOnce(&str) -> R) -> R {
        let interner = self.interner.read();
        f(interner.resolve(symbol).unwrap_or_default())
    }
}

/// An interned symbolic constant.
///
/// Two atoms are equal exactly when they were interned from the same name.
/// Ordering follows the name, which is how the host orders atoms.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(DefaultSymbol);

impl Atom {
    /// Interns `name` and returns its atom.
    pub fn new(name: &str) -> Self {
        Atom(ATOM_TABLE.intern(name))
    }

    /// Interns `name`, rejecting names longer than [`MAX_ATOM_CHARS`].
    pub fn try_new(name: &str) -> Result<Self, HostError> {
        let chars = name.chars().count();
        if chars > MAX_ATOM_CHARS {
            return Err(HostError::AtomTooLong { chars });
        }
        Ok(Self::new(name))
    }

    /// Returns an owned copy of the atom's name.
    pub fn name(&self) -> String {
        self.with_name(str::to_owned)
    }

    /// Runs `f` with the atom's name without allocating.
    pub fn with_name<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        ATOM_TABLE.with_name(self.0, f)
    }

    /// True if the atom's name is exactly `name`.
    pub fn is(&self, name: &str) -> bool {
        self.with_name(|own| own == name)
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        // Resolve both names under one read guard.
        let interner = ATOM_TABLE.interner.read();
        let left = interner.resolve(self.0).unwrap_or_default();
        let right = interner.resolve(other.0).unwrap_or_default();
        left.cmp(right)
    }
}

/// Bare atoms start with a lowercase letter and contain only word characters
/// or `@`; everything else prints quoted.
fn needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@')
        }
        _ => true,
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_name(|name| {
            if needs_quotes(name) {
                write!(f, "'{}'", name.escape_default())
            } else {
                f.write_str(name)
            }
        })
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Atom({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_atom_interning() {
        let atom = Atom::new("test_atom");
        assert_eq!(atom.name(), "test_atom");
        assert!(atom.is("test_atom"));
    }

    #[test]
    fn test_atom_deduplication() {
        let a = Atom::new("same_name");
        let b = Atom::new("same_name");
        assert_eq!(a, b);
        assert_ne!(a, Atom::new("other_name"));
    }

    #[test]
    fn test_atom_hash() {
        let mut set = HashSet::new();
        set.insert(Atom::new("h1"));
        set.insert(Atom::new("h2"));
        set.insert(Atom::new("h1"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_atom_ordering_follows_name() {
        // Intern in reverse order so symbol ids disagree with names.
        let zebra = Atom::new("ordering_zebra");
        let apple = Atom::new("ordering_apple");
        assert!(apple < zebra);
        assert_eq!(apple.cmp(&apple), Ordering::Equal);
    }

    #[test]
    fn test_try_new_length_limit() {
        let longest = "a".repeat(MAX_ATOM_CHARS);
        assert!(Atom::try_new(&longest).is_ok());
        let too_long = "a".repeat(MAX_ATOM_CHARS + 1);
        assert!(matches!(
            Atom::try_new(&too_long),
            Err(HostError::AtomTooLong { chars }) if chars == MAX_ATOM_CHARS + 1
        ));
    }

    #[test]
    fn test_atom_display_quoting() {
        assert_eq!(Atom::new("ok").to_string(), "ok");
        assert_eq!(Atom::new("node@host").to_string(), "node@host");
        assert_eq!(Atom::new("Elixir.Foo").to_string(), "'Elixir.Foo'");
        assert_eq!(Atom::new("").to_string(), "''");
    }
}
