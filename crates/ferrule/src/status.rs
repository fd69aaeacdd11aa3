//! Tagged success and failure values.
//!
//! `Ok(())` encodes as `ok`, `Ok(v)` as `{ok, v}`; `Error` likewise with
//! `error`.

use ferrule_host::{Atom, Env, Term};

use crate::atoms;
use crate::codec::{ensure_bound, mismatch, Decoder, Encoder};
use crate::error::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ok<T = ()>(pub T);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Error<T = ()>(pub T);

fn decode_bare(env: &Env, term: &Term, tag: Atom, expected: &'static str) -> Result<(), DecodeError> {
    ensure_bound(env, term)?;
    match term.as_atom() {
        Some(atom) if atom == tag => Result::Ok(()),
        _ => Result::Err(mismatch(expected, term)),
    }
}

fn decode_tagged<T: Decoder>(
    env: &Env,
    term: &Term,
    tag: Atom,
    expected: &'static str,
) -> Result<T, DecodeError> {
    let (found, value): (Atom, T) = match Decoder::decode(env, term) {
        Result::Ok(pair) => pair,
        Result::Err(DecodeError::Element { index: 0, .. }) => return Result::Err(mismatch(expected, term)),
        Result::Err(other) => return Result::Err(other),
    };
    if found != tag {
        return Result::Err(mismatch(expected, term));
    }
    Result::Ok(value)
}

impl Encoder for Ok<()> {
    fn encode(&self, env: &Env) -> Term {
        env.make_atom(atoms::ok())
    }
}

impl<T: Encoder> Encoder for Ok<T> {
    fn encode(&self, env: &Env) -> Term {
        env.make_tuple(&[env.make_atom(atoms::ok()), self.0.encode(env)])
    }
}

impl Decoder for Ok<()> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        decode_bare(env, term, atoms::ok(), "the atom ok").map(Ok)
    }
}

impl<T: Decoder> Decoder for Ok<T> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        decode_tagged(env, term, atoms::ok(), "an {ok, value} tuple").map(Ok)
    }
}

impl Encoder for Error<()> {
    fn encode(&self, env: &Env) -> Term {
        env.make_atom(atoms::error())
    }
}

impl<T: Encoder> Encoder for Error<T> {
    fn encode(&self, env: &Env) -> Term {
        env.make_tuple(&[env.make_atom(atoms::error()), self.0.encode(env)])
    }
}

impl Decoder for Error<()> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        decode_bare(env, term, atoms::error(), "the atom error").map(Error)
    }
}

impl<T: Decoder> Decoder for Error<T> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        decode_tagged(env, term, atoms::error(), "an {error, reason} tuple").map(Error)
    }
}
