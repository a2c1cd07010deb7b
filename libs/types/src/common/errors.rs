//! Error taxonomy and outcome type for invocations and tasks
//!
//! Every failure the runtime can produce is a [`RuntimeError`] value. Failures
//! are delivered through the same result channel as successes, wrapped in an
//! [`Outcome`], so a caller has one place to check how an invocation ended.
//! The enum is serde-serializable because remote failures cross localities
//! inside reply parcels.

use crate::common::identifiers::{ActionId, Gid, LocalityId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures surfaced by dispatch, scheduling and continuations
#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuntimeError {
    /// GID is not resolvable through the registry
    #[error("Unknown identity {gid}")]
    UnknownIdentity { gid: Gid },

    /// GID is already registered
    #[error("Identity {gid} is already registered")]
    DuplicateIdentity { gid: Gid },

    /// Parcel failed to decode (truncated, corrupted or type-mismatched)
    #[error("Malformed parcel: {reason}")]
    MalformedParcel { reason: String },

    /// Second assignment to a single-assignment continuation
    #[error("Continuation already satisfied")]
    AlreadySatisfied,

    /// Work was cancelled before it produced a result
    #[error("Cancelled")]
    Cancelled,

    /// No action with this id is registered on the executing locality
    #[error("Unknown action {action_id}")]
    UnknownAction { action_id: ActionId },

    /// A different action already claimed this action id
    #[error("Action id {action_id} already registered for {existing}, cannot register {requested}")]
    DuplicateAction {
        action_id: ActionId,
        existing: String,
        requested: String,
    },

    /// The component registered under a GID is not of the type the action expects
    #[error("Component {gid} is not a {expected}")]
    ComponentTypeMismatch { gid: Gid, expected: String },

    /// The action body returned an error
    #[error("Action {action} failed: {message}")]
    ActionFailed { action: String, message: String },

    /// The task body panicked; the panic was contained by the worker
    #[error("Task panicked: {message}")]
    TaskPanicked { message: String },

    /// Argument or result (de)serialization failed
    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    /// The transport collaborator refused or failed to send
    #[error("Transport to {destination} failed: {message}")]
    Transport {
        destination: LocalityId,
        message: String,
    },

    /// The scheduler no longer accepts work
    #[error("Scheduler is shut down")]
    ShutDown,
}

impl RuntimeError {
    /// Create a MalformedParcel error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedParcel {
            reason: reason.into(),
        }
    }

    /// Create a Serialization error
    pub fn serialization(message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
        }
    }

    /// Create an ActionFailed error
    pub fn action_failed(action: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ActionFailed {
            action: action.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transport error
    pub fn transport(destination: LocalityId, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            destination,
            message: message.to_string(),
        }
    }

    /// Whether this is the cancellation outcome
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Terminal result of a task or invocation
///
/// Cancellation is an ordinary variant, not an error path: a cancelled task
/// still has exactly one observable outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The work ran to completion and produced a value
    Completed(T),
    /// The work failed; the failure is carried as a value
    Failed(RuntimeError),
    /// The work was cancelled before producing a value
    Cancelled,
}

impl<T> Outcome<T> {
    /// Whether the outcome carries a value
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Whether the outcome is a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the work was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Borrow the failure, if any
    pub fn error(&self) -> Option<&RuntimeError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Convert into a `Result`, mapping cancellation to [`RuntimeError::Cancelled`]
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(err) => Err(err),
            Self::Cancelled => Err(RuntimeError::Cancelled),
        }
    }

    /// Map the completed value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Self::Completed(value) => Outcome::Completed(f(value)),
            Self::Failed(err) => Outcome::Failed(err),
            Self::Cancelled => Outcome::Cancelled,
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(RuntimeError::Cancelled) => Self::Cancelled,
            Err(err) => Self::Failed(err),
        }
    }
}
