//! A small bridged module shared by the unit tests of this crate.

use ferrule_host::{Atom, Env, LoadedModule, NifFlags, Term};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::codec::Encoder;
use crate::exception::{raise, Exception};
use crate::init::NifModule;
use crate::resource::{Resource, ResourcePtr};

const MODULE_NAME: &str = "Elixir.Ferrule.UnitTest";

/// (tag, environment present) for every destructor call.
pub(crate) static DESTRUCTED: Lazy<Mutex<Vec<(String, bool)>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// (tag, destructor already ran) for every drop.
pub(crate) static DROPPED: Lazy<Mutex<Vec<(String, bool)>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub(crate) struct Counter {
    value: i64,
    tag: String,
    destructed: bool,
}

impl Counter {
    pub(crate) fn new(value: i64, tag: &str) -> Self {
        Counter {
            value,
            tag: tag.to_owned(),
            destructed: false,
        }
    }

    pub(crate) fn value(&self) -> i64 {
        self.value
    }
}

impl Resource for Counter {
    const IMPLEMENTS_DESTRUCTOR: bool = true;

    fn destructor(&mut self, env: Option<&Env>) {
        self.destructed = true;
        DESTRUCTED.lock().push((self.tag.clone(), env.is_some()));
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        DROPPED.lock().push((self.tag.clone(), self.destructed));
    }
}

/// Implements [`Resource`] but is never registered.
pub(crate) struct Untracked;

impl Resource for Untracked {}

fn add(_env: &Env, a: i64, b: i64) -> i64 {
    a + b
}

fn answer(_env: &Env) -> i64 {
    42
}

fn checked_div(_env: &Env, a: i64, b: i64) -> Result<i64, Exception> {
    a.checked_div(b).ok_or_else(|| Exception::runtime("division by zero"))
}

fn panic_message(_env: &Env) -> i64 {
    panic!("native panic")
}

fn panic_opaque(_env: &Env) -> i64 {
    std::panic::panic_any(7u8)
}

fn raise_atom(env: &Env) -> Atom {
    raise(env, &Atom::new("oops"))
}

/// Panics when encoded.
pub(crate) struct Exploding;

impl Encoder for Exploding {
    fn encode(&self, _env: &Env) -> Term {
        panic!("exploding encoder")
    }
}

fn raise_exploding(_env: &Env) -> Result<i64, Exception> {
    Err(Exception::raise(Exploding))
}

fn counter_new(_env: &Env, value: i64, tag: String) -> Result<ResourcePtr<Counter>, Exception> {
    crate::resource::make_resource(Counter::new(value, &tag))
        .map_err(|e| Exception::runtime(e.to_string()))
}

fn counter_get(_env: &Env, counter: ResourcePtr<Counter>) -> i64 {
    counter.value()
}

static MODULE: Lazy<LoadedModule> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
    NifModule::new(MODULE_NAME)
        .resource::<Counter>("Counter")
        .function("add", add)
        .function_with_flags("answer", NifFlags::DirtyCpu, answer)
        .function("checked_div", checked_div)
        .function("panic_message", panic_message)
        .function("panic_opaque", panic_opaque)
        .function("raise_atom", raise_atom)
        .function("raise_exploding", raise_exploding)
        .function("counter_new", counter_new)
        .function("counter_get", counter_get)
        .load()
        .expect("unit test module loads")
});

/// Loads the shared module on first use.
pub(crate) fn init() -> &'static LoadedModule {
    &MODULE
}

pub(crate) fn module_name() -> Atom {
    Atom::new(MODULE_NAME)
}
