//! # Runtime Types Library
//!
//! Shared vocabulary for the lightweight-task runtime: global identities,
//! typed identifiers, the error taxonomy, task outcomes and structured events.
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{Gid, LocalityId, Outcome, RuntimeError};
//!
//! let gid = Gid::new(LocalityId::new(0), 1);
//! let outcome: Outcome<f64> = Err(RuntimeError::UnknownIdentity { gid }).into();
//! assert!(outcome.is_failed());
//! ```
//!
//! ## Integration Points
//!
//! - **codec**: parcels carry [`Gid`] and [`ActionId`] on the wire
//! - **scheduler**: tasks are named by [`TaskId`] and finish with an [`Outcome`]
//! - **dispatch**: the registry maps [`Gid`] to ([`LocalityId`], [`LocalHandle`])

pub mod common;
pub mod events;

pub use common::errors::{Outcome, Result, RuntimeError};
pub use common::identifiers::{ActionId, Gid, LocalHandle, LocalityId, TaskId};
pub use events::{
    EventSink, RecordingEventSink, RuntimeEvent, SharedEventSink, TerminationKind,
    TracingEventSink,
};
