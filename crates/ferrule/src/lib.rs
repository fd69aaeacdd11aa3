//! Typed native functions for a garbage-collected host runtime.
//!
//! `ferrule` sits between the host calling convention (`Fn(&Env, &[Term]) ->
//! Term`) and ordinary Rust functions. Arguments decode through [`Decoder`],
//! results encode through [`Encoder`], native objects live in the host as
//! [`ResourcePtr`]s, and every failure, from a bad argument to a panic, is
//! raised in the host as an equivalent error.
//!
//! ```ignore
//! use ferrule::{Env, NifModule};
//!
//! fn add(_env: &Env, a: i64, b: i64) -> i64 {
//!     a + b
//! }
//!
//! let module = NifModule::new("Elixir.Math.NIF").function("add", add).load()?;
//! ```

pub mod atoms;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod init;
pub mod record;
pub mod registry;
pub mod resource;
pub mod status;

#[cfg(test)]
mod test_support;

pub use codec::{decode, encode, Binary, Decoder, Encoder};
pub use config::{ArgumentErrorStyle, BridgeConfig, ReloadPolicy};
pub use dispatch::{dispatch, NifFunction, NifReturn};
pub use error::{BadArgument, DecodeError, ResourceError};
pub use exception::{raise, ArgumentError, Exception, RuntimeError};
pub use init::NifModule;
pub use record::{Record, RecordReader, RecordWriter};
pub use resource::{make_resource, Resource, ResourcePtr};

pub use ferrule_host::{Atom, Env, LoadedModule, NifFlags, Pid, Term};

#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}
