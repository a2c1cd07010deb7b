//! Locally hosted component instances

use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use types::{Gid, LocalHandle, Result, RuntimeError};

/// An addressable object whose methods are exposed as actions.
///
/// Actions receive the instance as `Arc<Self>`, so state that actions mutate
/// needs interior mutability.
pub trait Component: Send + Sync + 'static {
    /// Stable type name; part of every action id derived for this type
    const TYPE_NAME: &'static str;
}

pub(crate) type ErasedComponent = Arc<dyn Any + Send + Sync>;

struct Hosted {
    type_name: &'static str,
    instance: ErasedComponent,
}

/// Component instances living on this locality, keyed by local handle
#[derive(Default)]
pub struct ComponentStore {
    next_handle: AtomicU64,
    instances: DashMap<LocalHandle, Hosted>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<C: Component>(&self, component: C) -> LocalHandle {
        let handle = LocalHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.instances.insert(
            handle,
            Hosted {
                type_name: C::TYPE_NAME,
                instance: Arc::new(component),
            },
        );
        handle
    }

    /// Typed instance behind `handle`; `gid` is only used for error reporting
    pub fn get<C: Component>(&self, gid: Gid, handle: LocalHandle) -> Result<Arc<C>> {
        self.get_erased(gid, handle)?
            .downcast::<C>()
            .map_err(|_| RuntimeError::ComponentTypeMismatch {
                gid,
                expected: C::TYPE_NAME.to_string(),
            })
    }

    pub(crate) fn get_erased(&self, gid: Gid, handle: LocalHandle) -> Result<ErasedComponent> {
        self.instances
            .get(&handle)
            .map(|hosted| Arc::clone(&hosted.instance))
            .ok_or(RuntimeError::UnknownIdentity { gid })
    }

    pub fn type_name(&self, handle: LocalHandle) -> Option<&'static str> {
        self.instances.get(&handle).map(|hosted| hosted.type_name)
    }

    pub fn remove(&self, handle: LocalHandle) -> bool {
        self.instances.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl std::fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStore")
            .field("instances", &self.instances.len())
            .finish()
    }
}
