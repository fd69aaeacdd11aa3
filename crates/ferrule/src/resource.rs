use std::any::{self, Any};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use ferrule_host::{Env, ResourceHandle, Term};
use log::error;

use crate::codec::{mismatch, Decoder, Encoder};
use crate::error::{DecodeError, ResourceError};
use crate::registry;

/// A native type the host can own as a resource.
///
/// When the host drops its last reference, [`Resource::destructor`] runs
/// first (only if [`Resource::IMPLEMENTS_DESTRUCTOR`] is set), then the value
/// is dropped normally. Both may run on any thread. The environment passed to
/// the destructor is present only if reclamation happens inside a scheduler
/// context; `Drop` never gets one and must allocate its own if it needs the
/// runtime.
pub trait Resource: Send + Sync + Sized + 'static {
    const IMPLEMENTS_DESTRUCTOR: bool = false;

    fn destructor(&mut self, _env: Option<&Env>) {}
}

/// Shared reference to a native value owned by the host.
pub struct ResourcePtr<T: Resource> {
    handle: ResourceHandle,
    _marker: PhantomData<T>,
}

impl<T: Resource> ResourcePtr<T> {
    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    /// True if both point at the same resource.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        ResourceHandle::ptr_eq(&a.handle, &b.handle)
    }
}

impl<T: Resource> Clone for ResourcePtr<T> {
    fn clone(&self) -> Self {
        ResourcePtr {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Resource> Deref for ResourcePtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // A ResourcePtr<T> is only built for handles of T's registered type,
        // whose payload is always a T.
        self.handle
            .payload()
            .downcast_ref::<T>()
            .expect("resource payload matches its registered type")
    }
}

impl<T: Resource + fmt::Debug> fmt::Debug for ResourcePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourcePtr").field(&**self).finish()
    }
}

/// Moves `value` into a new host resource.
///
/// Fails if `T` was not declared with [`NifModule::resource`](crate::NifModule::resource)
/// on the loaded module.
pub fn make_resource<T: Resource>(value: T) -> Result<ResourcePtr<T>, ResourceError> {
    let rtype = registry::resource_type::<T>().ok_or(ResourceError::Unregistered {
        type_name: any::type_name::<T>(),
    })?;
    Ok(ResourcePtr {
        handle: ResourceHandle::alloc(&rtype, Box::new(value)),
        _marker: PhantomData,
    })
}

impl<T: Resource> Encoder for ResourcePtr<T> {
    fn encode(&self, env: &Env) -> Term {
        env.make_resource(&self.handle)
    }
}

impl<T: Resource> Decoder for ResourcePtr<T> {
    fn decode(_env: &Env, term: &Term) -> Result<Self, DecodeError> {
        let handle = term.as_resource().ok_or_else(|| mismatch("a resource", term))?;
        match registry::resource_type::<T>() {
            Some(expected) if Arc::ptr_eq(&expected, handle.resource_type()) => Ok(ResourcePtr {
                handle: handle.clone(),
                _marker: PhantomData,
            }),
            expected => Err(DecodeError::ResourceTypeMismatch {
                expected: expected
                    .map(|rtype| rtype.name().to_owned())
                    .unwrap_or_else(|| any::type_name::<T>().to_owned()),
                found: handle.resource_type().name().to_owned(),
            }),
        }
    }
}

/// Host destructor callback for `T`.
pub(crate) fn destructor_trampoline<T: Resource>(
    env: Option<&Env>,
    payload: &mut (dyn Any + Send + Sync),
) {
    let Some(value) = payload.downcast_mut::<T>() else {
        error!(
            "Resource destructor for {} got a payload of another type",
            any::type_name::<T>()
        );
        return;
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| value.destructor(env)));
    if outcome.is_err() {
        error!("Resource destructor for {} panicked", any::type_name::<T>());
    }
}
