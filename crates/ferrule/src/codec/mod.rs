//! Conversion between host terms and native values.
//!
//! Every participating type implements [`Encoder`] (native to term) and
//! [`Decoder`] (term to native). Decoding checks that the term is bound to
//! the environment it is decoded in; atoms and resources are exempt since
//! they do not depend on an environment.

mod containers;
mod primitives;
mod variant;

pub use primitives::Binary;

use ferrule_host::{Env, Term};

use crate::error::DecodeError;

pub trait Encoder {
    fn encode(&self, env: &Env) -> Term;
}

pub trait Decoder: Sized {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError>;
}

/// Encodes `value` in `env`.
pub fn encode<T: Encoder + ?Sized>(env: &Env, value: &T) -> Term {
    value.encode(env)
}

/// Decodes `term` as a `T`.
pub fn decode<T: Decoder>(env: &Env, term: &Term) -> Result<T, DecodeError> {
    T::decode(env, term)
}

pub(crate) fn ensure_bound(env: &Env, term: &Term) -> Result<(), DecodeError> {
    if term.is_bound_to(env) {
        Ok(())
    } else {
        Err(DecodeError::EnvMismatch)
    }
}

pub(crate) fn mismatch(expected: &'static str, term: &Term) -> DecodeError {
    DecodeError::Shape {
        expected,
        found: term.kind(),
    }
}
