//! # Location-Transparent Dispatch
//!
//! Turns a typed invocation on a global identity into either a local task or
//! a parcel, and routes results back through a [`Continuation`].
//!
//! ## Architecture
//!
//! ```text
//!  invoke::<A>(gid, args)
//!        │ resolve (GidRegistry)
//!        ├── local ──► ComponentStore ──► scheduler task ──► Continuation
//!        └── remote ─► Parcel(cont gid) ──► Transport ─────► peer locality
//!                                                               │
//!  PendingReplies ◄── reply parcel ◄── task ◄── ActionRegistry ◄┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use dispatch::{Action, Component, Locality};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//! use types::{LocalityId, Outcome};
//!
//! #[derive(Default)]
//! struct Total(Mutex<i64>);
//! impl Component for Total {
//!     const TYPE_NAME: &'static str = "total";
//! }
//!
//! struct Add;
//! #[async_trait]
//! impl Action for Add {
//!     type Component = Total;
//!     type Args = i64;
//!     type Output = i64;
//!     const NAME: &'static str = "add";
//!
//!     async fn invoke(total: Arc<Total>, by: i64) -> types::Result<i64> {
//!         let mut value = total.0.lock();
//!         *value += by;
//!         Ok(*value)
//!     }
//! }
//!
//! let locality = Locality::builder(LocalityId::new(0)).workers(2).build().unwrap();
//! locality.register_action::<Add>().unwrap();
//! let gid = locality.create_component(Total::default()).unwrap();
//!
//! assert_eq!(locality.invoke::<Add>(gid, 5).wait(), Outcome::Completed(5));
//! locality.shutdown();
//! ```

pub mod action;
pub mod applier;
pub mod component;
mod inbound;
pub mod locality;
pub mod pending;
pub mod registry;
pub mod transport;

pub use action::{action_id, signature, Action, ActionDescriptor, ActionRegistry};
pub use applier::{Applier, DispatchOptions};
pub use component::{Component, ComponentStore};
pub use locality::{Locality, LocalityBuilder};
pub use pending::PendingReplies;
pub use registry::{GidRegistry, Location};
pub use transport::{
    pump, ChannelNetwork, ChannelTransport, Mailbox, NoRemoteTransport, Transport,
    TransportMetrics,
};

pub use scheduler::Continuation;
