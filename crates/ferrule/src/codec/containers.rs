use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use ferrule_host::{Env, Term};

use super::{ensure_bound, mismatch, Decoder, Encoder};
use crate::atoms;
use crate::error::DecodeError;

/// `None` is the atom `nil`. An `Option<Atom>` holding `nil` therefore
/// decodes as `None`.
impl<T: Encoder> Encoder for Option<T> {
    fn encode(&self, env: &Env) -> Term {
        match self {
            Some(value) => value.encode(env),
            None => env.make_atom(atoms::nil()),
        }
    }
}

impl<T: Decoder> Decoder for Option<T> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        if term.as_atom() == Some(atoms::nil()) {
            return Ok(None);
        }
        T::decode(env, term).map(Some)
    }
}

impl<T: Encoder> Encoder for [T] {
    fn encode(&self, env: &Env) -> Term {
        let elements: Vec<Term> = self.iter().map(|item| item.encode(env)).collect();
        env.make_list(&elements)
    }
}

impl<T: Encoder> Encoder for Vec<T> {
    fn encode(&self, env: &Env) -> Term {
        self.as_slice().encode(env)
    }
}

impl<T: Decoder> Decoder for Vec<T> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        let elements = term.list_elements().ok_or_else(|| mismatch("a list", term))?;
        elements
            .iter()
            .enumerate()
            .map(|(index, item)| T::decode(env, item).map_err(|e| e.in_element(index)))
            .collect()
    }
}

macro_rules! impl_tuple_codec {
    ($($arity:literal => ($($ty:ident $idx:tt),+);)+) => {$(
        impl<$($ty: Encoder),+> Encoder for ($($ty,)+) {
            fn encode(&self, env: &Env) -> Term {
                env.make_tuple(&[$(self.$idx.encode(env)),+])
            }
        }

        impl<$($ty: Decoder),+> Decoder for ($($ty,)+) {
            fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
                ensure_bound(env, term)?;
                let elements = term.tuple_elements().ok_or_else(|| mismatch("a tuple", term))?;
                if elements.len() != $arity {
                    return Err(DecodeError::Arity {
                        expected: $arity,
                        found: elements.len(),
                    });
                }
                Ok(($(
                    $ty::decode(env, &elements[$idx]).map_err(|e| e.in_element($idx))?,
                )+))
            }
        }
    )+};
}

impl_tuple_codec! {
    1 => (A 0);
    2 => (A 0, B 1);
    3 => (A 0, B 1, C 2);
    4 => (A 0, B 1, C 2, D 3);
    5 => (A 0, B 1, C 2, D 3, E 4);
    6 => (A 0, B 1, C 2, D 3, E 4, F 5);
    7 => (A 0, B 1, C 2, D 3, E 4, F 5, G 6);
    8 => (A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);
}

fn encode_entries<'a, K, V>(env: &Env, entries: impl Iterator<Item = (&'a K, &'a V)>) -> Term
where
    K: Encoder + 'a,
    V: Encoder + 'a,
{
    let entries: Vec<(Term, Term)> = entries
        .map(|(key, value)| (key.encode(env), value.encode(env)))
        .collect();
    env.make_map_overwrite(&entries)
}

fn decode_entries<K: Decoder, V: Decoder>(
    env: &Env,
    term: &Term,
) -> Result<impl Iterator<Item = Result<(K, V), DecodeError>>, DecodeError> {
    ensure_bound(env, term)?;
    let entries = term.map_entries().ok_or_else(|| mismatch("a map", term))?;
    let env = env.clone();
    Ok(entries.into_iter().map(move |(key, value)| {
        let key = K::decode(&env, &key).map_err(DecodeError::in_map_entry)?;
        let value = V::decode(&env, &value).map_err(DecodeError::in_map_entry)?;
        Ok((key, value))
    }))
}

impl<K: Encoder, V: Encoder> Encoder for BTreeMap<K, V> {
    fn encode(&self, env: &Env) -> Term {
        encode_entries(env, self.iter())
    }
}

impl<K: Decoder + Ord, V: Decoder> Decoder for BTreeMap<K, V> {
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        decode_entries(env, term)?.collect()
    }
}

impl<K: Encoder, V: Encoder, S> Encoder for HashMap<K, V, S> {
    fn encode(&self, env: &Env) -> Term {
        encode_entries(env, self.iter())
    }
}

impl<K, V, S> Decoder for HashMap<K, V, S>
where
    K: Decoder + Eq + Hash,
    V: Decoder,
    S: BuildHasher + Default,
{
    fn decode(env: &Env, term: &Term) -> Result<Self, DecodeError> {
        decode_entries(env, term)?.collect()
    }
}
