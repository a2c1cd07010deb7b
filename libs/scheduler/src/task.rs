//! Lightweight task cell and its state machine
//!
//! ```text
//!            spawn                 worker pops
//!   (new) ──────────► QUEUED ─────────────────► RUNNING ──► DONE (ready)
//!                       ▲                        │  ▲
//!                       │ wake                   │  │ wake while running
//!                       │                        ▼  │
//!                      IDLE ◄──────────────── poll Pending
//!                                   (NOTIFIED re-queues instead)
//! ```
//!
//! `IDLE` and `QUEUED` tasks can be cancelled directly (CAS to `DONE`, body
//! dropped without being polled again). A `RUNNING` task only has its cancel
//! flag raised; the worker honours it when the poll returns.

use crate::scheduler::Shared;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake};
use types::{TaskId, TerminationKind};

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const NOTIFIED: u8 = 2;
const IDLE: u8 = 3;
const DONE: u8 = 4;

/// Home worker not yet assigned
pub(crate) const NO_HOME: usize = usize::MAX;

/// Observable lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Created, never run
    Pending,
    /// Being executed by a worker
    Active,
    /// Blocked at a suspension point (including woken but not yet re-run)
    Suspended,
    /// Finished, failed or cancelled; never left
    Terminated,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

pub(crate) type TaskBody = BoxFuture<'static, TerminationKind>;
pub(crate) type CancelHook = Box<dyn FnOnce() + Send>;

/// What the worker must do after a `Pending` poll
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AfterPending {
    /// Parked until woken
    Suspended,
    /// Woken during the poll; push back on a run queue
    Requeue,
    /// Cancel was requested; the task is now terminal
    Cancelled,
}

pub(crate) struct TaskCell {
    id: TaskId,
    state: AtomicU8,
    home: AtomicUsize,
    ran_once: AtomicBool,
    cancel_requested: Arc<AtomicBool>,
    /// Terminal state was (or is about to be) reached through cancellation
    cancelled: AtomicBool,
    body: Mutex<Option<TaskBody>>,
    on_cancel: Mutex<Option<CancelHook>>,
    shared: Weak<Shared>,
}

impl TaskCell {
    pub(crate) fn new(
        id: TaskId,
        home: usize,
        body: TaskBody,
        cancel_requested: Arc<AtomicBool>,
        on_cancel: CancelHook,
        shared: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            state: AtomicU8::new(QUEUED),
            home: AtomicUsize::new(home),
            ran_once: AtomicBool::new(false),
            cancel_requested,
            cancelled: AtomicBool::new(false),
            body: Mutex::new(Some(body)),
            on_cancel: Mutex::new(Some(on_cancel)),
            shared,
        }
    }

    /// Cell for a task refused at spawn (scheduler shut down)
    pub(crate) fn terminated(id: TaskId) -> Self {
        Self {
            id,
            state: AtomicU8::new(DONE),
            home: AtomicUsize::new(NO_HOME),
            ran_once: AtomicBool::new(false),
            cancel_requested: Arc::new(AtomicBool::new(false)),
            cancelled: AtomicBool::new(false),
            body: Mutex::new(None),
            on_cancel: Mutex::new(None),
            shared: Weak::new(),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn state(&self) -> TaskState {
        match self.state.load(Ordering::Acquire) {
            QUEUED if !self.ran_once.load(Ordering::Acquire) => TaskState::Pending,
            QUEUED | IDLE => TaskState::Suspended,
            RUNNING | NOTIFIED => TaskState::Active,
            _ => TaskState::Terminated,
        }
    }

    pub(crate) fn home(&self) -> usize {
        self.home.load(Ordering::Relaxed)
    }

    /// First worker to run the task becomes its home
    pub(crate) fn claim_home(&self, worker: usize) {
        let _ = self
            .home
            .compare_exchange(NO_HOME, worker, Ordering::Relaxed, Ordering::Relaxed);
    }

    /// QUEUED -> RUNNING. Fails for stale queue entries of cancelled tasks.
    pub(crate) fn try_activate(&self) -> bool {
        self.state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Mark as run; returns whether it had run before (i.e. this is a resumption)
    pub(crate) fn mark_ran(&self) -> bool {
        self.ran_once.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Poll the body once. The body lock is released before returning.
    pub(crate) fn poll(&self, cx: &mut Context<'_>) -> Poll<TerminationKind> {
        let mut slot = self.body.lock();
        let Some(body) = slot.as_mut() else {
            return Poll::Ready(TerminationKind::Cancelled);
        };
        match body.as_mut().poll(cx) {
            Poll::Ready(kind) => {
                *slot = None;
                Poll::Ready(kind)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// RUNNING -> DONE after the body completed
    pub(crate) fn complete(&self, kind: TerminationKind) {
        self.cancelled
            .store(kind == TerminationKind::Cancelled, Ordering::Release);
        self.state.store(DONE, Ordering::Release);
        self.on_cancel.lock().take();
    }

    /// Transition out of RUNNING after a `Pending` poll
    pub(crate) fn after_pending(&self) -> AfterPending {
        if self.cancel_requested() {
            self.cancelled.store(true, Ordering::Release);
            self.state.store(DONE, Ordering::Release);
            return AfterPending::Cancelled;
        }

        match self
            .state
            .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                if self.cancel_requested() && self.cancel_from(IDLE) {
                    AfterPending::Cancelled
                } else {
                    AfterPending::Suspended
                }
            }
            Err(_) => {
                // NOTIFIED: only this worker moves the task out of it
                self.state.store(QUEUED, Ordering::Release);
                if self.cancel_requested() && self.cancel_from(QUEUED) {
                    AfterPending::Cancelled
                } else {
                    AfterPending::Requeue
                }
            }
        }
    }

    /// RUNNING -> DONE when the cancel flag was raised while queued
    pub(crate) fn abort_if_requested(&self) -> bool {
        if self.cancel_requested() && self.cancel_from(RUNNING) {
            self.finish_cancelled();
            true
        } else {
            false
        }
    }

    /// Request cancellation.
    ///
    /// Suspended or queued tasks terminate immediately with a cancelled
    /// outcome. Running tasks terminate at their next suspension point or at
    /// completion. Returns `false` if the task had already terminated, or
    /// terminated otherwise before this request took effect.
    pub(crate) fn cancel(&self) -> bool {
        // whether this call raised the flag the worker may act on
        let mut raised = false;
        loop {
            match self.state.load(Ordering::Acquire) {
                DONE => return raised && self.cancelled.load(Ordering::Acquire),
                current @ (IDLE | QUEUED) => {
                    if self.cancel_from(current) {
                        self.finish_cancelled();
                        return true;
                    }
                }
                _ => {
                    raised |= !self.cancel_requested.swap(true, Ordering::AcqRel);
                    if matches!(self.state.load(Ordering::Acquire), RUNNING | NOTIFIED) {
                        return true;
                    }
                    // the worker left RUNNING; retry against its new state
                }
            }
        }
    }

    /// Drop the body without resuming it and deliver the cancelled outcome
    pub(crate) fn finish_cancelled(&self) {
        let body = self.body.lock().take();
        drop(body);

        let hook = self.on_cancel.lock().take();
        if let Some(hook) = hook {
            hook();
        }

        if let Some(shared) = self.shared.upgrade() {
            shared.task_terminated(self.id, TerminationKind::Cancelled);
        }
    }

    /// `from` -> DONE on behalf of a cancel request
    fn cancel_from(&self, from: u8) -> bool {
        self.cancelled.store(true, Ordering::Release);
        self.transition(from, DONE)
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Wake for TaskCell {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self.transition(IDLE, QUEUED) {
                        if let Some(shared) = self.shared.upgrade() {
                            shared.schedule(Arc::clone(self));
                        }
                        return;
                    }
                }
                RUNNING => {
                    if self.transition(RUNNING, NOTIFIED) {
                        return;
                    }
                }
                // already queued, already notified, or terminal
                _ => return,
            }
        }
    }
}

impl fmt::Debug for TaskCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCell")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("home", &self.home())
            .finish()
    }
}
