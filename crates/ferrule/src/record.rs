//! Native structs mapped to tagged host maps.
//!
//! A record encodes as `%{__struct__ => Module, field => value, ...}` with
//! entries in declaration order; raisable records also carry
//! `__exception__ => true`. Decoding checks the module tag, then looks every
//! declared field up by name, so the host's entry order does not matter and
//! extra entries are ignored.

use ferrule_host::{Atom, Env, Term};

use crate::atoms;
use crate::codec::{ensure_bound, mismatch, Decoder, Encoder};
use crate::error::DecodeError;

/// A struct with a host module tag. Usually implemented by [`record!`](crate::record!).
pub trait Record: Sized {
    /// Name of the host module that tags this record.
    const MODULE: &'static str;
    /// Field names in declaration order.
    const FIELDS: &'static [&'static str];
    /// Whether the host may raise this record.
    const IS_EXCEPTION: bool;

    fn module() -> Atom {
        Atom::new(Self::MODULE)
    }
}

/// Host tag of a field declared as `ident`: the identifier without its raw
/// prefix, so `r#type` tags as `type`.
#[doc(hidden)]
pub const fn field_tag(ident: &'static str) -> &'static str {
    let bytes = ident.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'r' && bytes[1] == b'#' {
        let (_, rest) = bytes.split_at(2);
        match std::str::from_utf8(rest) {
            Ok(tag) => tag,
            Err(_) => ident,
        }
    } else {
        ident
    }
}

pub struct RecordWriter<'a> {
    env: &'a Env,
    entries: Vec<(Term, Term)>,
    is_exception: bool,
}

impl<'a> RecordWriter<'a> {
    pub fn new<R: Record>(env: &'a Env) -> Self {
        let mut entries = Vec::with_capacity(R::FIELDS.len() + 2);
        entries.push((env.make_atom(atoms::struct_()), env.make_atom(R::module())));
        RecordWriter {
            env,
            entries,
            is_exception: R::IS_EXCEPTION,
        }
    }

    pub fn field<T: Encoder + ?Sized>(mut self, name: &str, value: &T) -> Self {
        let key = self.env.make_atom(Atom::new(name));
        let value = value.encode(self.env);
        self.entries.push((key, value));
        self
    }

    pub fn finish(mut self) -> Term {
        if self.is_exception {
            let flag = true.encode(self.env);
            self.entries.push((self.env.make_atom(atoms::exception_()), flag));
        }
        self.env.make_map_overwrite(&self.entries)
    }
}

pub struct RecordReader<'a> {
    env: &'a Env,
    term: &'a Term,
    module: Atom,
}

impl<'a> RecordReader<'a> {
    /// Checks that `term` is a map tagged with `R`'s module.
    pub fn new<R: Record>(env: &'a Env, term: &'a Term) -> Result<Self, DecodeError> {
        ensure_bound(env, term)?;
        if term.map_size().is_none() {
            return Err(mismatch("a map", term));
        }
        let module = R::module();
        let tag = term.map_get(&env.make_atom(atoms::struct_()));
        match tag.as_ref().and_then(Term::as_atom) {
            Some(found) if found == module => Ok(RecordReader { env, term, module }),
            _ => Err(DecodeError::TypeTagMismatch {
                expected: module,
                found: tag.map(|t| t.to_string()),
            }),
        }
    }

    pub fn field<T: Decoder>(&self, name: &'static str) -> Result<T, DecodeError> {
        let value = self
            .term
            .map_get(&self.env.make_atom(Atom::new(name)))
            .ok_or(DecodeError::MissingField {
                module: self.module,
                field: name,
            })?;
        T::decode(self.env, &value).map_err(|e| e.in_field(name))
    }
}

/// Declares a struct together with its [`Record`], [`Encoder`] and
/// [`Decoder`] implementations.
///
/// Adding `exception` after the module name makes the record raisable and
/// converts it into [`Exception`](crate::Exception). A field tags as its own
/// name unless `= "tag"` follows its type.
///
/// ```ignore
/// ferrule::record! {
///     module = "Elixir.FineTest.Error", exception;
///     #[derive(Debug)]
///     pub struct ExError {
///         pub data: i64,
///         pub kind: String = "type",
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        module = $module:literal $(, $exception:ident)? ;
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $fty:ty $(= $tag:literal)? ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $fty ),*
        }

        impl $crate::Record for $name {
            const MODULE: &'static str = $module;
            const FIELDS: &'static [&'static str] = &[$($crate::__record_field_tag!($field $(, $tag)?)),*];
            const IS_EXCEPTION: bool = $crate::__record_is_exception!($($exception)?);
        }

        impl $crate::Encoder for $name {
            fn encode(&self, env: &$crate::Env) -> $crate::Term {
                $crate::RecordWriter::new::<Self>(env)
                    $(.field($crate::__record_field_tag!($field $(, $tag)?), &self.$field))*
                    .finish()
            }
        }

        impl $crate::Decoder for $name {
            fn decode(
                env: &$crate::Env,
                term: &$crate::Term,
            ) -> ::std::result::Result<Self, $crate::DecodeError> {
                #[allow(unused_variables)]
                let reader = $crate::RecordReader::new::<Self>(env, term)?;
                ::std::result::Result::Ok($name {
                    $( $field: reader.field($crate::__record_field_tag!($field $(, $tag)?))?, )*
                })
            }
        }

        $crate::__record_exception_impl!($name $(, $exception)?);
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_field_tag {
    ($field:ident) => {
        $crate::record::field_tag(stringify!($field))
    };
    ($field:ident, $tag:literal) => {
        $tag
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_is_exception {
    () => {
        false
    };
    (exception) => {
        true
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __record_exception_impl {
    ($name:ident) => {};
    ($name:ident, exception) => {
        impl ::std::convert::From<$name> for $crate::Exception {
            fn from(value: $name) -> Self {
                $crate::Exception::raise(value)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};

    crate::record! {
        module = "Elixir.Ferrule.Point";
        #[derive(Debug, Clone, PartialEq)]
        struct Point {
            x: i64,
            y: i64,
        }
    }

    crate::record! {
        module = "Elixir.Ferrule.Failure", exception;
        #[derive(Debug, PartialEq)]
        struct Failure {
            data: i64,
        }
    }

    crate::record! {
        module = "Elixir.Ferrule.Typed";
        #[derive(Debug, PartialEq)]
        struct Typed {
            r#type: i64,
            label: String = "name",
        }
    }

    #[test]
    fn test_field_tags() {
        assert_eq!(Typed::FIELDS, &["type", "name"]);
        assert_eq!(field_tag("r#match"), "match");
        assert_eq!(field_tag("r"), "r");

        let env = Env::alloc();
        let value = Typed {
            r#type: 1,
            label: "one".to_owned(),
        };
        let term = encode(&env, &value);
        assert_eq!(
            term.to_string(),
            "#{'__struct__' => 'Elixir.Ferrule.Typed', type => 1, name => <<\"one\">>}"
        );
        assert_eq!(decode::<Typed>(&env, &term).ok(), Some(value));
    }

    #[test]
    fn test_record_metadata() {
        assert_eq!(Point::FIELDS, &["x", "y"]);
        assert!(!Point::IS_EXCEPTION);
        assert!(Failure::IS_EXCEPTION);
        assert!(Point::module().is("Elixir.Ferrule.Point"));
    }

    #[test]
    fn test_encode_declared_order() {
        let env = Env::alloc();
        let term = encode(&env, &Point { x: 1, y: 2 });
        let keys: Vec<String> = term
            .map_entries()
            .expect("a map")
            .into_iter()
            .map(|(key, _)| key.to_string())
            .collect();
        assert_eq!(keys, vec!["'__struct__'", "x", "y"]);
        assert_eq!(term.to_string(), "#{'__struct__' => 'Elixir.Ferrule.Point', x => 1, y => 2}");
    }

    #[test]
    fn test_exception_flag() {
        let env = Env::alloc();
        let term = encode(&env, &Failure { data: 10 });
        let flag = term
            .map_get(&env.make_atom(Atom::new("__exception__")))
            .and_then(|v| v.as_atom());
        assert_eq!(flag, Some(Atom::new("true")));
        assert_eq!(decode::<Failure>(&env, &term).ok(), Some(Failure { data: 10 }));
    }

    #[test]
    fn test_decode_matches_fields_by_name() {
        let env = Env::alloc();
        let term = env
            .make_map(&[
                (env.make_atom(Atom::new("y")), env.make_integer(4)),
                (env.make_atom(Atom::new("extra")), env.make_integer(0)),
                (
                    env.make_atom(Atom::new("__struct__")),
                    env.make_atom(Atom::new("Elixir.Ferrule.Point")),
                ),
                (env.make_atom(Atom::new("x")), env.make_integer(3)),
            ])
            .expect("distinct keys");
        assert_eq!(decode::<Point>(&env, &term).ok(), Some(Point { x: 3, y: 4 }));
    }

    #[test]
    fn test_decode_missing_field() {
        let env = Env::alloc();
        let term = env
            .make_map(&[
                (
                    env.make_atom(Atom::new("__struct__")),
                    env.make_atom(Atom::new("Elixir.Ferrule.Point")),
                ),
                (env.make_atom(Atom::new("x")), env.make_integer(3)),
            ])
            .expect("distinct keys");
        assert!(matches!(
            decode::<Point>(&env, &term),
            Err(DecodeError::MissingField { field: "y", .. })
        ));
    }

    #[test]
    fn test_decode_wrong_tag() {
        let env = Env::alloc();
        let failure = encode(&env, &Failure { data: 1 });
        assert!(matches!(
            decode::<Point>(&env, &failure),
            Err(DecodeError::TypeTagMismatch { found: Some(_), .. })
        ));

        let untagged = env
            .make_map(&[(env.make_atom(Atom::new("x")), env.make_integer(3))])
            .expect("single key");
        assert!(matches!(
            decode::<Point>(&env, &untagged),
            Err(DecodeError::TypeTagMismatch { found: None, .. })
        ));
    }

    #[test]
    fn test_field_error_context() {
        let env = Env::alloc();
        let term = RecordWriter::new::<Point>(&env)
            .field("x", &1i64)
            .field("y", "not a number")
            .finish();
        match decode::<Point>(&env, &term) {
            Err(DecodeError::Field { field: "y", .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
