//! The boundary between the host calling convention and typed native
//! functions.
//!
//! Every call decodes its arguments in order, runs the native function and
//! encodes its result. Decode failures, returned errors, explicit raises and
//! panics all end at [`dispatch`], which raises them in the host. Nothing
//! unwinds past it.

use std::panic::{self, AssertUnwindSafe};

use ferrule_host::{Env, Term};
use log::trace;

use crate::codec::{Decoder, Encoder};
use crate::error::BadArgument;
use crate::exception::{self, Exception};
use crate::registry;

/// What a native function may return.
pub trait NifReturn {
    fn into_term(self, env: &Env) -> Result<Term, Exception>;
}

impl<T: Encoder> NifReturn for T {
    fn into_term(self, env: &Env) -> Result<Term, Exception> {
        Ok(self.encode(env))
    }
}

impl<T: Encoder, E: Into<Exception>> NifReturn for Result<T, E> {
    fn into_term(self, env: &Env) -> Result<Term, Exception> {
        self.map(|value| value.encode(env)).map_err(Into::into)
    }
}

/// A typed native function `Fn(&Env, A1, ..., An) -> R`.
///
/// `Args` is the tuple of argument types; it only disambiguates the arities.
pub trait NifFunction<Args>: Send + Sync + 'static {
    const ARITY: usize;

    fn invoke(&self, env: &Env, args: &[Term]) -> Result<Term, Exception>;
}

fn decode_argument<T: Decoder>(env: &Env, args: &[Term], index: usize) -> Result<T, Exception> {
    T::decode(env, &args[index]).map_err(|error| {
        Exception::Argument(BadArgument {
            position: index + 1,
            error,
        })
    })
}

macro_rules! impl_nif_function {
    ($($arity:literal => ($($ty:ident $arg:ident $idx:literal),*);)+) => {$(
        impl<Func, Ret, $($ty),*> NifFunction<($($ty,)*)> for Func
        where
            Func: Fn(&Env $(, $ty)*) -> Ret + Send + Sync + 'static,
            Ret: NifReturn,
            $($ty: Decoder,)*
        {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn invoke(&self, env: &Env, args: &[Term]) -> Result<Term, Exception> {
                $(let $arg = decode_argument::<$ty>(env, args, $idx)?;)*
                (self)(env $(, $arg)*).into_term(env)
            }
        }
    )+};
}

impl_nif_function! {
    0 => ();
    1 => (A a 0);
    2 => (A a 0, B b 1);
    3 => (A a 0, B b 1, C c 2);
    4 => (A a 0, B b 1, C c 2, D d 3);
    5 => (A a 0, B b 1, C c 2, D d 3, E e 4);
    6 => (A a 0, B b 1, C c 2, D d 3, E e 4, F f 5);
    7 => (A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6);
    8 => (A a 0, B b 1, C c 2, D d 3, E e 4, F f 5, G g 6, H h 7);
}

/// Runs `call` for the native function `name` and hands its outcome to the
/// host: the result term, or a raised exception.
pub fn dispatch<F>(env: &Env, name: &str, call: F) -> Term
where
    F: FnOnce() -> Result<Term, Exception>,
{
    trace!("Dispatching {}", name);
    let exception = match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(term)) => return term,
        Ok(Err(exception)) => exception,
        Err(payload) => Exception::from_panic(payload),
    };
    exception::raise_exception(env, registry::config(), name, exception)
}

/// Adapts a typed native function to the host calling convention.
pub(crate) fn host_fn<F, Args>(name: String, fun: F) -> impl Fn(&Env, &[Term]) -> Term + Send + Sync + 'static
where
    F: NifFunction<Args>,
    Args: 'static,
{
    move |env: &Env, args: &[Term]| {
        if args.len() != F::ARITY {
            return exception::raise_exception(
                env,
                registry::config(),
                &name,
                Exception::invalid_argument(format!(
                    "{} takes {} arguments, got {}",
                    name,
                    F::ARITY,
                    args.len()
                )),
            );
        }
        dispatch(env, &name, || fun.invoke(env, args))
    }
}
