//! Native module `Elixir.FineTest.NIF`, one function per bridged shape.
//!
//! Every `codec_*` function decodes its argument and encodes it straight
//! back, so a host-side round trip exercises both directions of a codec.

use std::collections::BTreeMap;
use std::thread;

use ferrule::status::{Error, Ok};
use ferrule::{
    raise, Atom, Binary, Encoder, Env, Exception, LoadedModule, NifModule, Pid, Resource,
    ResourcePtr, Term,
};
use ferrule_host::HostError;
use log::debug;

pub const MODULE_NAME: &str = "Elixir.FineTest.NIF";

pub mod atoms {
    ferrule::atoms! {
        destructor_with_env,
        destructor_default,
        oops,
    }
}

/// Reports its teardown to `pid`, once from each teardown step.
pub struct TestResource {
    pub pid: Pid,
}

impl Resource for TestResource {
    const IMPLEMENTS_DESTRUCTOR: bool = true;

    fn destructor(&mut self, env: Option<&Env>) {
        let msg_env = Env::alloc();
        let msg = atoms::destructor_with_env().encode(&msg_env);
        ferrule_host::send(env, &self.pid, &msg_env, &msg);
    }
}

impl Drop for TestResource {
    fn drop(&mut self) {
        let target = self.pid;
        // No environment here, so the message goes out from a helper thread
        // with one of its own.
        thread::spawn(move || {
            let msg_env = Env::alloc();
            let msg = atoms::destructor_default().encode(&msg_env);
            if !ferrule_host::send(None, &target, &msg_env, &msg) {
                debug!("{} exited before {} arrived", target, msg);
            }
        });
    }
}

ferrule::record! {
    module = "Elixir.FineTest.Point";
    #[derive(Debug, Clone, PartialEq)]
    pub struct ExPoint {
        pub x: i64,
        pub y: i64,
    }
}

ferrule::record! {
    module = "Elixir.FineTest.Error", exception;
    #[derive(Debug, Clone, PartialEq)]
    pub struct ExError {
        pub data: i64,
    }
}

ferrule::variant! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum IntOrString {
        Int(i64),
        Text(String),
    }
}

fn add(_env: &Env, x: i64, y: i64) -> i64 {
    x + y
}

fn codec_term(_env: &Env, term: Term) -> Term {
    term
}

fn codec_int64(_env: &Env, term: i64) -> i64 {
    term
}

fn codec_uint64(_env: &Env, term: u64) -> u64 {
    term
}

fn codec_double(_env: &Env, term: f64) -> f64 {
    term
}

fn codec_bool(_env: &Env, term: bool) -> bool {
    term
}

fn codec_pid(_env: &Env, term: Pid) -> Pid {
    term
}

fn codec_binary(_env: &Env, term: Binary) -> Binary {
    Binary(term.to_vec())
}

fn codec_string(_env: &Env, term: String) -> String {
    term
}

fn codec_atom(_env: &Env, term: Atom) -> Atom {
    term
}

fn codec_nullopt(_env: &Env) -> Option<i64> {
    None
}

fn codec_optional_int64(_env: &Env, term: Option<i64>) -> Option<i64> {
    term
}

fn codec_variant_int64_or_string(_env: &Env, term: IntOrString) -> IntOrString {
    term
}

fn codec_tuple_int64_and_string(_env: &Env, term: (i64, String)) -> (i64, String) {
    term
}

fn codec_vector_int64(_env: &Env, term: Vec<i64>) -> Vec<i64> {
    term
}

fn codec_map_atom_int64(_env: &Env, term: BTreeMap<Atom, i64>) -> BTreeMap<Atom, i64> {
    term
}

fn codec_resource(_env: &Env, term: ResourcePtr<TestResource>) -> ResourcePtr<TestResource> {
    term
}

fn codec_struct(_env: &Env, term: ExPoint) -> ExPoint {
    term
}

fn codec_struct_exception(_env: &Env, term: ExError) -> ExError {
    term
}

fn codec_ok_empty(_env: &Env) -> Ok {
    Ok(())
}

fn codec_ok_int64(_env: &Env, term: i64) -> Ok<i64> {
    Ok(term)
}

fn codec_error_empty(_env: &Env) -> Error {
    Error(())
}

fn codec_error_string(_env: &Env, term: String) -> Error<String> {
    Error(term)
}

fn resource_create(_env: &Env, pid: Pid) -> Result<ResourcePtr<TestResource>, Exception> {
    ferrule::make_resource(TestResource { pid }).map_err(|e| Exception::runtime(e.to_string()))
}

fn resource_get(_env: &Env, resource: ResourcePtr<TestResource>) -> Pid {
    resource.pid
}

fn throw_runtime_error(_env: &Env) -> Result<i64, Exception> {
    Err(Exception::runtime("runtime error reason"))
}

fn throw_invalid_argument(_env: &Env) -> Result<i64, Exception> {
    Err(Exception::invalid_argument("invalid argument reason"))
}

fn throw_other_exception(_env: &Env) -> Result<i64, Exception> {
    Err(Exception::Unknown)
}

fn raise_elixir_exception(env: &Env) -> i64 {
    raise(env, &ExError { data: 10 })
}

fn raise_erlang_error(env: &Env) -> i64 {
    raise(env, &atoms::oops())
}

fn return_elixir_exception(_env: &Env, data: i64) -> Result<i64, ExError> {
    Err(ExError { data })
}

fn panic_with_message(_env: &Env) -> i64 {
    panic!("native code panicked")
}

/// The module definition, ready to load.
pub fn nif_module() -> NifModule {
    NifModule::new(MODULE_NAME)
        .resource::<TestResource>("TestResource")
        .function("add", add)
        .function("codec_term", codec_term)
        .function("codec_int64", codec_int64)
        .function("codec_uint64", codec_uint64)
        .function("codec_double", codec_double)
        .function("codec_bool", codec_bool)
        .function("codec_pid", codec_pid)
        .function("codec_binary", codec_binary)
        .function("codec_string", codec_string)
        .function("codec_atom", codec_atom)
        .function("codec_nullopt", codec_nullopt)
        .function("codec_optional_int64", codec_optional_int64)
        .function("codec_variant_int64_or_string", codec_variant_int64_or_string)
        .function("codec_tuple_int64_and_string", codec_tuple_int64_and_string)
        .function("codec_vector_int64", codec_vector_int64)
        .function("codec_map_atom_int64", codec_map_atom_int64)
        .function("codec_resource", codec_resource)
        .function("codec_struct", codec_struct)
        .function("codec_struct_exception", codec_struct_exception)
        .function("codec_ok_empty", codec_ok_empty)
        .function("codec_ok_int64", codec_ok_int64)
        .function("codec_error_empty", codec_error_empty)
        .function("codec_error_string", codec_error_string)
        .function("resource_create", resource_create)
        .function("resource_get", resource_get)
        .function("throw_runtime_error", throw_runtime_error)
        .function("throw_invalid_argument", throw_invalid_argument)
        .function("throw_other_exception", throw_other_exception)
        .function("raise_elixir_exception", raise_elixir_exception)
        .function("raise_erlang_error", raise_erlang_error)
        .function("return_elixir_exception", return_elixir_exception)
        .function("panic_with_message", panic_with_message)
}

/// Loads the module. A process may do this once.
pub fn load() -> Result<LoadedModule, HostError> {
    nif_module().load()
}
