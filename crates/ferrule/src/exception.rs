//! Native failures and how they surface in the host.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use ferrule_host::{Env, Term};
use log::debug;
use thiserror::Error;

use crate::codec::Encoder;
use crate::config::{ArgumentErrorStyle, BridgeConfig};
use crate::error::{BadArgument, DecodeError};

/// A failure of a native function, raised in the host by the dispatcher.
#[derive(Debug, Error)]
pub enum Exception {
    /// An argument did not decode.
    #[error(transparent)]
    Argument(#[from] BadArgument),

    /// The native code rejected an argument it did decode.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Runtime(String),

    /// A failure that carries nothing to report.
    #[error("unknown native failure")]
    Unknown,

    /// A value raised exactly as it encodes.
    #[error("raised {0:?}")]
    Raise(RaiseValue),

    /// A term raised as is.
    #[error("raised {0}")]
    Term(Term),
}

impl Exception {
    pub fn runtime(message: impl Into<String>) -> Self {
        Exception::Runtime(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Exception::InvalidArgument(message.into())
    }

    /// Raises `value` as encoded, typically a raisable record.
    pub fn raise<T: Encoder + Send + Sync + 'static>(value: T) -> Self {
        Exception::Raise(RaiseValue {
            value: Box::new(value),
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Classifies a panic payload caught at the dispatch boundary.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<RaisedTerm>() {
            Ok(raised) => return Exception::Term(raised.0),
            Err(other) => other,
        };
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            return Exception::Runtime((*message).to_owned());
        }
        match payload.downcast::<String>() {
            Ok(message) => Exception::Runtime(*message),
            Err(_) => Exception::Unknown,
        }
    }
}

impl From<DecodeError> for Exception {
    fn from(error: DecodeError) -> Self {
        Exception::InvalidArgument(error.to_string())
    }
}

/// Boxed value waiting to be encoded in the raising environment.
pub struct RaiseValue {
    value: Box<dyn Encoder + Send + Sync>,
    type_name: &'static str,
}

impl RaiseValue {
    fn encode(&self, env: &Env) -> Term {
        self.value.encode(env)
    }
}

impl fmt::Debug for RaiseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {}", self.type_name)
    }
}

/// Unwind payload of [`raise`].
pub(crate) struct RaisedTerm(pub(crate) Term);

/// Raises `value` in the host and does not return.
///
/// Unwinds to the dispatcher of the current native call, which raises the
/// encoded value. Calling this outside a native call unwinds the thread.
pub fn raise<T: Encoder + ?Sized>(env: &Env, value: &T) -> ! {
    let term = value.encode(env);
    panic::resume_unwind(Box::new(RaisedTerm(term)))
}

crate::record! {
    module = "Elixir.ArgumentError", exception;
    #[derive(Debug, Clone, PartialEq)]
    pub struct ArgumentError {
        pub message: String,
    }
}

crate::record! {
    module = "Elixir.RuntimeError", exception;
    #[derive(Debug, Clone, PartialEq)]
    pub struct RuntimeError {
        pub message: Option<String>,
    }
}

fn argument_error(env: &Env, config: &BridgeConfig, message: String) -> Term {
    match config.argument_errors {
        ArgumentErrorStyle::Struct => ArgumentError { message }.encode(env),
        ArgumentErrorStyle::Badarg => env.make_atom(crate::atoms::badarg()),
    }
}

/// Turns `exception` into the host reason it raises as.
pub(crate) fn reason_term(env: &Env, config: &BridgeConfig, exception: Exception) -> Term {
    match exception {
        Exception::Argument(bad) => argument_error(env, config, bad.to_string()),
        Exception::InvalidArgument(message) => argument_error(env, config, message),
        Exception::Runtime(message) => RuntimeError {
            message: Some(message),
        }
        .encode(env),
        Exception::Unknown => RuntimeError { message: None }.encode(env),
        Exception::Raise(value) => value.encode(env),
        Exception::Term(term) => term.encode(env),
    }
}

/// Like [`reason_term`], but a panic while encoding the reason is itself
/// translated instead of unwinding into the host.
fn guarded_reason_term(env: &Env, config: &BridgeConfig, exception: Exception) -> Term {
    match panic::catch_unwind(AssertUnwindSafe(|| reason_term(env, config, exception))) {
        Ok(reason) => reason,
        // from_panic never yields Raise, so this encoding cannot panic.
        Err(payload) => reason_term(env, config, Exception::from_panic(payload)),
    }
}

/// Raises `exception` in `env` on behalf of `function`.
pub(crate) fn raise_exception(
    env: &Env,
    config: &BridgeConfig,
    function: &str,
    exception: Exception,
) -> Term {
    let reason = guarded_reason_term(env, config, exception);
    if config.log_raises {
        debug!("{} raised {}", function, reason);
    }
    env.raise_exception(&reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, Decoder};
    use crate::error::DecodeError;
    use crate::test_support::Exploding;
    use ferrule_host::{Atom, TermKind};

    fn reason(exception: Exception) -> Term {
        reason_term(&Env::alloc(), &BridgeConfig::default(), exception)
    }

    fn decode_in_own_env<T: crate::Decoder>(term: &Term) -> T {
        let env = Env::alloc();
        decode(&env, &env.copy(term)).expect("decodes")
    }

    #[test]
    fn test_runtime_message() {
        let term = reason(Exception::runtime("runtime error reason"));
        let error: RuntimeError = decode_in_own_env(&term);
        assert_eq!(error.message.as_deref(), Some("runtime error reason"));
    }

    #[test]
    fn test_unknown_has_nil_message() {
        let term = reason(Exception::Unknown);
        let error: RuntimeError = decode_in_own_env(&term);
        assert_eq!(error.message, None);
        let flag = term.map_get(&Env::alloc().make_atom(Atom::new("__exception__")));
        assert_eq!(flag.and_then(|t| t.as_atom()), Some(Atom::new("true")));
    }

    #[test]
    fn test_argument_errors() {
        let bad = BadArgument {
            position: 2,
            error: DecodeError::Shape {
                expected: "an integer",
                found: TermKind::Binary,
            },
        };
        let error: ArgumentError = decode_in_own_env(&reason(bad.into()));
        assert_eq!(
            error.message,
            "could not decode argument 2: expected an integer, got a binary"
        );

        let error: ArgumentError =
            decode_in_own_env(&reason(Exception::invalid_argument("invalid argument reason")));
        assert_eq!(error.message, "invalid argument reason");
    }

    #[test]
    fn test_badarg_style() {
        let config = BridgeConfig {
            argument_errors: ArgumentErrorStyle::Badarg,
            ..BridgeConfig::default()
        };
        let term = reason_term(&Env::alloc(), &config, Exception::invalid_argument("x"));
        assert_eq!(term.as_atom(), Some(Atom::new("badarg")));
    }

    #[test]
    fn test_raise_value_passes_through() {
        let term = reason(Exception::raise(Atom::new("oops")));
        assert_eq!(term.as_atom(), Some(Atom::new("oops")));
    }

    #[test]
    fn test_panicking_raise_value_is_translated() {
        let env = Env::alloc();
        let exception = Exception::raise(Exploding);
        assert!(format!("{:?}", exception).contains("Exploding"));

        let term = raise_exception(&env, &BridgeConfig::default(), "explode", exception);
        assert!(term.as_atom().is_some());
        let reason = env.take_exception().expect("raised");
        let error = RuntimeError::decode(&env, &reason).expect("runtime error");
        assert_eq!(error.message.as_deref(), Some("exploding encoder"));
    }

    #[test]
    fn test_raise_inside_reason_encoding() {
        struct Reraising;

        impl Encoder for Reraising {
            fn encode(&self, env: &Env) -> Term {
                raise(env, &Atom::new("inner"))
            }
        }

        let env = Env::alloc();
        let term = guarded_reason_term(&env, &BridgeConfig::default(), Exception::raise(Reraising));
        assert_eq!(term.as_atom(), Some(Atom::new("inner")));
    }

    #[test]
    fn test_panic_payload_classification() {
        assert!(matches!(
            Exception::from_panic(Box::new("static message")),
            Exception::Runtime(m) if m == "static message"
        ));
        assert!(matches!(
            Exception::from_panic(Box::new(String::from("owned message"))),
            Exception::Runtime(m) if m == "owned message"
        ));
        assert!(matches!(Exception::from_panic(Box::new(42u32)), Exception::Unknown));

        let env = Env::alloc();
        let raised = RaisedTerm(env.make_integer(5));
        assert!(matches!(
            Exception::from_panic(Box::new(raised)),
            Exception::Term(t) if t.as_integer() == Some(5)
        ));
    }

    #[test]
    fn test_raise_unwinds_with_term() {
        let env = Env::alloc();
        let payload = std::panic::catch_unwind(|| {
            let env = Env::alloc();
            raise(&env, &Atom::new("oops"))
        })
        .expect_err("raise never returns");
        match Exception::from_panic(payload) {
            Exception::Term(term) => {
                assert_eq!(decode::<Atom>(&env, &term).ok(), Some(Atom::new("oops")));
            }
            other => panic!("unexpected exception: {:?}", other),
        }
    }
}
