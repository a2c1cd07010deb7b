//! Structured runtime events
//!
//! Scheduler and dispatch report what they do through an [`EventSink`]. The
//! sink decides how (and whether) events are rendered; the default
//! [`TracingEventSink`] forwards them to `tracing`.

use crate::common::identifiers::{ActionId, Gid, LocalityId, TaskId};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// How a task reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationKind {
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Something observable happened inside the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    TaskSpawned {
        task_id: TaskId,
        worker: Option<usize>,
    },
    TaskSuspended {
        task_id: TaskId,
        worker: usize,
    },
    TaskResumed {
        task_id: TaskId,
    },
    TaskTerminated {
        task_id: TaskId,
        kind: TerminationKind,
    },
    ParcelSent {
        destination: Gid,
        action_id: ActionId,
        locality: LocalityId,
        bytes: usize,
    },
    ParcelReceived {
        destination: Gid,
        action_id: ActionId,
        bytes: usize,
    },
    ParcelRejected {
        reason: String,
    },
    ResolutionFailed {
        gid: Gid,
    },
}

/// Receiver of structured runtime events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &RuntimeEvent);
}

/// Shared, type-erased sink handle
pub type SharedEventSink = Arc<dyn EventSink>;

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &RuntimeEvent) {
        match event {
            RuntimeEvent::TaskSpawned { task_id, worker } => {
                tracing::trace!(task_id = %task_id, worker = ?worker, "task spawned");
            }
            RuntimeEvent::TaskSuspended { task_id, worker } => {
                tracing::trace!(task_id = %task_id, worker, "task suspended");
            }
            RuntimeEvent::TaskResumed { task_id } => {
                tracing::trace!(task_id = %task_id, "task resumed");
            }
            RuntimeEvent::TaskTerminated { task_id, kind } => {
                tracing::trace!(task_id = %task_id, kind = %kind, "task terminated");
            }
            RuntimeEvent::ParcelSent {
                destination,
                action_id,
                locality,
                bytes,
            } => {
                tracing::debug!(
                    gid = %destination,
                    action_id = %action_id,
                    locality = %locality,
                    bytes,
                    "parcel sent"
                );
            }
            RuntimeEvent::ParcelReceived {
                destination,
                action_id,
                bytes,
            } => {
                tracing::debug!(gid = %destination, action_id = %action_id, bytes, "parcel received");
            }
            RuntimeEvent::ParcelRejected { reason } => {
                tracing::warn!(reason = %reason, "parcel rejected");
            }
            RuntimeEvent::ResolutionFailed { gid } => {
                tracing::warn!(gid = %gid, "identity resolution failed");
            }
        }
    }
}

/// Buffers every event in memory; used by tests to assert on emitted events
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<RuntimeEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far
    pub fn events(&self) -> Vec<RuntimeEvent> {
        self.events.lock().clone()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&RuntimeEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &RuntimeEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingEventSink::new();
        sink.emit(&RuntimeEvent::TaskSpawned {
            task_id: TaskId::new(1),
            worker: Some(0),
        });
        sink.emit(&RuntimeEvent::TaskTerminated {
            task_id: TaskId::new(1),
            kind: TerminationKind::Completed,
        });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(
            sink.count(|e| matches!(e, RuntimeEvent::TaskTerminated { .. })),
            1
        );

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_all_events() {
        let sink = TracingEventSink;
        sink.emit(&RuntimeEvent::ResolutionFailed {
            gid: Gid::INVALID,
        });
        sink.emit(&RuntimeEvent::ParcelRejected {
            reason: "truncated".to_string(),
        });
    }
}
