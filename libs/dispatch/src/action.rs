//! Action descriptors
//!
//! An [`Action`] is one invocable method of a [`Component`] type with typed
//! arguments and result. Its [`ActionId`] is derived from the signature, so
//! every locality that registers the same action agrees on the id without a
//! handshake.
//!
//! Registration stores a type-erased entry point that decodes arguments,
//! runs the action and encodes the result. Only parcels arriving from other
//! localities go through it; local invocations call the typed action
//! directly.

use crate::component::{Component, ErasedComponent};
use async_trait::async_trait;
use bytes::Bytes;
use codec::args;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha3::{Digest, Sha3_256};
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use types::{ActionId, Gid, Result, RuntimeError};

/// One invocable method of a component type
///
/// ```rust
/// use async_trait::async_trait;
/// use dispatch::{Action, Component};
/// use std::sync::Arc;
///
/// struct Greeter;
/// impl Component for Greeter {
///     const TYPE_NAME: &'static str = "greeter";
/// }
///
/// struct Greet;
///
/// #[async_trait]
/// impl Action for Greet {
///     type Component = Greeter;
///     type Args = String;
///     type Output = String;
///     const NAME: &'static str = "greet";
///
///     async fn invoke(_: Arc<Greeter>, name: String) -> types::Result<String> {
///         Ok(format!("hello {}", name))
///     }
/// }
///
/// assert_eq!(Greet::id(), Greet::id());
/// ```
#[async_trait]
pub trait Action: Send + Sync + 'static {
    type Component: Component;
    type Args: Serialize + DeserializeOwned + Send + 'static;
    type Output: Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    /// Method name; part of the derived id
    const NAME: &'static str;

    async fn invoke(component: Arc<Self::Component>, args: Self::Args) -> Result<Self::Output>;

    /// Stable id derived from the signature
    fn id() -> ActionId
    where
        Self: Sized,
    {
        action_id::<Self>()
    }
}

static ACTION_IDS: Lazy<DashMap<TypeId, ActionId>> = Lazy::new(DashMap::new);

/// `component::action(args)->output`
pub fn signature<A: Action>() -> String {
    format!(
        "{}::{}({})->{}",
        <A::Component as Component>::TYPE_NAME,
        A::NAME,
        type_name::<A::Args>(),
        type_name::<A::Output>()
    )
}

/// First 8 bytes (little-endian) of SHA3-256 over the signature, memoized per type
pub fn action_id<A: Action>() -> ActionId {
    if let Some(id) = ACTION_IDS.get(&TypeId::of::<A>()) {
        return *id;
    }
    let id = derive_id(&signature::<A>());
    ACTION_IDS.insert(TypeId::of::<A>(), id);
    id
}

fn derive_id(signature: &str) -> ActionId {
    let digest = Sha3_256::digest(signature.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let raw = u64::from_le_bytes(prefix);
    // keep clear of the reserved reply id
    if raw == ActionId::REPLY.inner() {
        ActionId::new(raw ^ 1)
    } else {
        ActionId::new(raw)
    }
}

type EntryPoint =
    dyn Fn(Gid, ErasedComponent, Bytes) -> BoxFuture<'static, Result<Bytes>> + Send + Sync;

/// Registered, type-erased description of an action
#[derive(Clone)]
pub struct ActionDescriptor {
    pub id: ActionId,
    pub signature: String,
    pub component_type: &'static str,
    pub args_type: &'static str,
    pub output_type: &'static str,
    entry: Arc<EntryPoint>,
}

impl ActionDescriptor {
    fn of<A: Action>() -> Self {
        Self {
            id: A::id(),
            signature: signature::<A>(),
            component_type: <A::Component as Component>::TYPE_NAME,
            args_type: type_name::<A::Args>(),
            output_type: type_name::<A::Output>(),
            entry: Arc::new(run_encoded::<A>),
        }
    }

    /// Decode `payload`, run the action on `component`, encode the result
    pub(crate) fn call(
        &self,
        gid: Gid,
        component: ErasedComponent,
        payload: Bytes,
    ) -> BoxFuture<'static, Result<Bytes>> {
        (self.entry)(gid, component, payload)
    }
}

fn run_encoded<A: Action>(
    gid: Gid,
    component: ErasedComponent,
    payload: Bytes,
) -> BoxFuture<'static, Result<Bytes>> {
    async move {
        let component = component.downcast::<A::Component>().map_err(|_| {
            RuntimeError::ComponentTypeMismatch {
                gid,
                expected: <A::Component as Component>::TYPE_NAME.to_string(),
            }
        })?;
        let arguments: A::Args = args::decode(&payload)?;
        let output = A::invoke(component, arguments).await?;
        Ok(args::encode(&output)?)
    }
    .boxed()
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("id", &self.id)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Actions this locality can execute on behalf of parcels
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: DashMap<ActionId, ActionDescriptor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `A`. Idempotent; fails with `DuplicateAction` if a different
    /// action already holds the derived id.
    pub fn register<A: Action>(&self) -> Result<ActionId> {
        let descriptor = ActionDescriptor::of::<A>();
        let id = descriptor.id;

        match self.actions.entry(id) {
            Entry::Occupied(existing) => {
                if existing.get().signature == descriptor.signature {
                    Ok(id)
                } else {
                    Err(RuntimeError::DuplicateAction {
                        action_id: id,
                        existing: existing.get().signature.clone(),
                        requested: descriptor.signature,
                    })
                }
            }
            Entry::Vacant(slot) => {
                debug!(action_id = %id, signature = %descriptor.signature, "registered action");
                slot.insert(descriptor);
                Ok(id)
            }
        }
    }

    pub fn get(&self, id: ActionId) -> Option<ActionDescriptor> {
        self.actions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.actions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
