use std::ops::Deref;

use ferrule_host::{Atom, Env, Pid, Term};

use super::{ensure_bound, mismatch, Decoder, Encoder};
use crate::atoms;
use crate::error::DecodeError;

macro_rules! impl_integer_codec {
    ($($ty:ty),* $(,)?) => {$(
        impl Encoder for $ty {
            fn encode(&self, env: &Env) -> Term {
                env.make_integer(*self as i128)
            }
        }

        impl Decoder for $ty {
            fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
                ensure_bound(env, term)?;
                let value = term.as_integer().ok_or_else(|| mismatch("an integer", term))?;
                <$ty>::try_from(value).map_err(|_| DecodeError::Range {
                    value: value.to_string(),
                    target: stringify!($ty),
                })
            }
        }
    )*};
}

impl_integer_codec!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Encoder for f64 {
    fn encode(&self, env: &Env) -> Term {
        env.make_float(*self)
    }
}

impl Decoder for f64 {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        term.as_float().ok_or_else(|| mismatch("a float", term))
    }
}

impl Encoder for f32 {
    fn encode(&self, env: &Env) -> Term {
        env.make_float(f64::from(*self))
    }
}

/// Only floats an `f32` holds exactly decode; narrowing never rounds.
impl Decoder for f32 {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        let value = f64::decode(env, term)?;
        let narrowed = value as f32;
        if f64::from(narrowed) != value && !value.is_nan() {
            return Err(DecodeError::Range {
                value: value.to_string(),
                target: "f32",
            });
        }
        Ok(narrowed)
    }
}

impl Encoder for bool {
    fn encode(&self, env: &Env) -> Term {
        env.make_atom(if *self { atoms::true_() } else { atoms::false_() })
    }
}

impl Decoder for bool {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        match term.as_atom() {
            Some(atom) if atom == atoms::true_() => Ok(true),
            Some(atom) if atom == atoms::false_() => Ok(false),
            _ => Err(mismatch("a boolean", term)),
        }
    }
}

impl Encoder for Atom {
    fn encode(&self, env: &Env) -> Term {
        env.make_atom(*self)
    }
}

impl Decoder for Atom {
    fn decode(_env: &Env, term: &Term) -> Result<Self, DecodeError> {
        term.as_atom().ok_or_else(|| mismatch("an atom", term))
    }
}

impl Encoder for Pid {
    fn encode(&self, env: &Env) -> Term {
        env.make_pid(*self)
    }
}

impl Decoder for Pid {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        term.as_pid().ok_or_else(|| mismatch("a pid", term))
    }
}

/// Passes the term through untouched. Encoding a term bound elsewhere copies it.
impl Encoder for Term {
    fn encode(&self, env: &Env) -> Term {
        if self.is_bound_to(env) {
            self.clone()
        } else {
            env.copy(self)
        }
    }
}

impl Decoder for Term {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        Ok(term.clone())
    }
}

/// Raw bytes, carried as a host binary without any text validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Binary(pub Vec<u8>);

impl Binary {
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for Binary {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Binary(bytes)
    }
}

impl From<&[u8]> for Binary {
    fn from(bytes: &[u8]) -> Self {
        Binary(bytes.to_vec())
    }
}

impl Encoder for Binary {
    fn encode(&self, env: &Env) -> Term {
        env.make_binary(&self.0)
    }
}

impl Decoder for Binary {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        term.as_binary()
            .map(Binary::from)
            .ok_or_else(|| mismatch("a binary", term))
    }
}

impl Encoder for str {
    fn encode(&self, env: &Env) -> Term {
        env.make_binary(self.as_bytes())
    }
}

impl Encoder for String {
    fn encode(&self, env: &Env) -> Term {
        self.as_str().encode(env)
    }
}

impl Decoder for String {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        let bytes = term.as_binary().ok_or_else(|| mismatch("a binary", term))?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| DecodeError::Encoding(e.to_string()))
    }
}

impl<T: Encoder + ?Sized> Encoder for &T {
    fn encode(&self, env: &Env) -> Term {
        (**self).encode(env)
    }
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn encode(&self, env: &Env) -> Term {
        (**self).encode(env)
    }
}

impl<T: Decoder> Decoder for Box<T> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        T::decode(env, term).map(Box::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    #[test]
    fn test_integer_round_trips() {
        let env = Env::alloc();
        assert_eq!(decode::<i64>(&env, &encode(&env, &i64::MIN)).ok(), Some(i64::MIN));
        assert_eq!(decode::<u64>(&env, &encode(&env, &u64::MAX)).ok(), Some(u64::MAX));
        assert_eq!(decode::<i8>(&env, &encode(&env, &-128i8)).ok(), Some(-128));
    }

    #[test]
    fn test_integer_range_checks() {
        let env = Env::alloc();
        let too_big = env.make_integer(i128::from(u64::MAX) + 1);
        assert!(matches!(
            decode::<u64>(&env, &too_big),
            Err(DecodeError::Range { target: "u64", .. })
        ));

        let negative = env.make_integer(-1);
        assert!(matches!(
            decode::<u32>(&env, &negative),
            Err(DecodeError::Range { target: "u32", .. })
        ));

        let below = env.make_integer(i128::from(i64::MIN) - 1);
        assert!(decode::<i64>(&env, &below).is_err());
        assert_eq!(decode::<u8>(&env, &env.make_integer(255)).ok(), Some(255));
        assert!(decode::<u8>(&env, &env.make_integer(256)).is_err());
    }

    #[test]
    fn test_integer_rejects_float() {
        let env = Env::alloc();
        assert!(matches!(
            decode::<i64>(&env, &env.make_float(1.0)),
            Err(DecodeError::Shape { expected: "an integer", .. })
        ));
    }

    #[test]
    fn test_floats() {
        let env = Env::alloc();
        assert_eq!(decode::<f64>(&env, &encode(&env, &10.5f64)).ok(), Some(10.5));
        assert_eq!(decode::<f32>(&env, &encode(&env, &1.25f32)).ok(), Some(1.25));
        assert!(matches!(
            decode::<f32>(&env, &env.make_float(1e300)),
            Err(DecodeError::Range { target: "f32", .. })
        ));
        assert!(matches!(
            decode::<f32>(&env, &env.make_float(0.1)),
            Err(DecodeError::Range { target: "f32", .. })
        ));
        assert!(decode::<f64>(&env, &env.make_integer(1)).is_err());
    }

    #[test]
    fn test_bool() {
        let env = Env::alloc();
        assert_eq!(encode(&env, &true).as_atom(), Some(Atom::new("true")));
        assert_eq!(decode::<bool>(&env, &encode(&env, &false)).ok(), Some(false));
        assert!(decode::<bool>(&env, &env.make_atom(Atom::new("maybe"))).is_err());
    }

    #[test]
    fn test_text_and_binary() {
        let env = Env::alloc();
        let text = encode(&env, "héllo");
        assert_eq!(decode::<String>(&env, &text).ok().as_deref(), Some("héllo"));

        let invalid = env.make_binary(&[0xff, 0xfe]);
        assert!(matches!(decode::<String>(&env, &invalid), Err(DecodeError::Encoding(_))));
        assert_eq!(
            decode::<Binary>(&env, &invalid).ok(),
            Some(Binary(vec![0xff, 0xfe]))
        );
    }

    #[test]
    fn test_env_mismatch_except_atoms() {
        let env = Env::alloc();
        let other = Env::alloc();
        assert!(matches!(
            decode::<i64>(&env, &other.make_integer(1)),
            Err(DecodeError::EnvMismatch)
        ));
        let atom = other.make_atom(Atom::new("portable"));
        assert_eq!(decode::<Atom>(&env, &atom).ok(), Some(Atom::new("portable")));
    }

    #[test]
    fn test_term_passthrough_copies_foreign_terms() {
        let env = Env::alloc();
        let other = Env::alloc();
        let foreign = other.make_integer(9);
        let encoded = encode(&env, &foreign);
        assert!(encoded.is_bound_to(&env));
        assert_eq!(encoded, foreign);
        assert!(decode::<Term>(&env, &foreign).is_err());
    }
}
