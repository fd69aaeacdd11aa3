use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::atom::Atom;
use crate::collector;
use crate::env::Env;
use crate::error::HostError;

/// Custom destructor of a resource type.
///
/// Runs once, when the last reference is released, before the payload is
/// dropped. The environment is present only if the release happened inside a
/// scheduler context.
pub type ResourceDtor = fn(Option<&Env>, &mut (dyn Any + Send + Sync));

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

/// Every resource type opened in this runtime, keyed by (module, name).
static RESOURCE_TYPES: Lazy<DashMap<(Atom, String), Arc<ResourceType>>> = Lazy::new(DashMap::new);

/// How [`open_resource_type`] treats an existing type of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// The type must not exist yet.
    Create,
    /// The type must exist; its destructor is replaced.
    Takeover,
}

/// A registered kind of resource.
pub struct ResourceType {
    id: u64,
    module: Atom,
    name: String,
    dtor: RwLock<Option<ResourceDtor>>,
}

impl ResourceType {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn module(&self) -> Atom {
        self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_destructor(&self) -> bool {
        self.dtor.read().is_some()
    }

    fn destructor(&self) -> Option<ResourceDtor> {
        *self.dtor.read()
    }
}

impl fmt::Debug for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceType")
            .field("id", &self.id)
            .field("module", &self.module)
            .field("name", &self.name)
            .field("has_destructor", &self.has_destructor())
            .finish()
    }
}

/// Opens a resource type. Only reachable through a module load callback.
pub(crate) fn open_resource_type(
    module: Atom,
    name: &str,
    dtor: Option<ResourceDtor>,
    mode: OpenMode,
) -> Result<Arc<ResourceType>, HostError> {
    match (RESOURCE_TYPES.entry((module, name.to_owned())), mode) {
        (Entry::Vacant(slot), OpenMode::Create) => {
            let rtype = Arc::new(ResourceType {
                id: NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed),
                module,
                name: name.to_owned(),
                dtor: RwLock::new(dtor),
            });
            debug!("Opened resource type {}:{} (id {})", module, name, rtype.id);
            Ok(Arc::clone(slot.insert(rtype).value()))
        }
        (Entry::Occupied(slot), OpenMode::Takeover) => {
            let rtype = Arc::clone(slot.get());
            *rtype.dtor.write() = dtor;
            debug!("Took over resource type {}:{} (id {})", module, name, rtype.id);
            Ok(rtype)
        }
        (Entry::Occupied(_), OpenMode::Create) => Err(HostError::ResourceTypeExists {
            module,
            name: name.to_owned(),
        }),
        (Entry::Vacant(_), OpenMode::Takeover) => Err(HostError::UnknownResourceType {
            module,
            name: name.to_owned(),
        }),
    }
}

struct ResourceCell {
    rtype: Arc<ResourceType>,
    payload: Box<dyn Any + Send + Sync>,
}

impl Drop for ResourceCell {
    fn drop(&mut self) {
        let env = collector::current_env();
        debug!(
            "Reclaiming {} resource at {:p} ({})",
            self.rtype.name,
            self as *const ResourceCell,
            if env.is_some() { "in scheduler" } else { "outside scheduler" }
        );
        if let Some(dtor) = self.rtype.destructor() {
            dtor(env.as_ref(), &mut *self.payload);
        }
        // The payload box is dropped after this body returns.
    }
}

/// Reference-counted handle to a native object owned by the host.
///
/// Each clone is one more host-side reference. When the last one goes, the
/// type's destructor runs and then the payload is dropped.
#[derive(Clone)]
pub struct ResourceHandle(Arc<ResourceCell>);

impl ResourceHandle {
    /// Moves `payload` into a new resource of type `rtype`.
    pub fn alloc(rtype: &Arc<ResourceType>, payload: Box<dyn Any + Send + Sync>) -> Self {
        ResourceHandle(Arc::new(ResourceCell {
            rtype: Arc::clone(rtype),
            payload,
        }))
    }

    pub fn resource_type(&self) -> &Arc<ResourceType> {
        &self.0.rtype
    }

    pub fn payload(&self) -> &(dyn Any + Send + Sync) {
        &*self.0.payload
    }

    pub fn ptr_eq(a: &ResourceHandle, b: &ResourceHandle) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Current number of references, this one included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Stable address identifying this resource while it is alive.
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceHandle({}@{:#x})", self.0.rtype.name, self.address())
    }
}
