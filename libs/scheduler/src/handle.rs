//! Caller-side handle to a spawned task

use crate::continuation::{Continuation, GetResult};
use crate::task::{TaskCell, TaskState};
use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use types::{Outcome, TaskId};

/// Handle returned by `Scheduler::spawn*`
///
/// Dropping the handle does not cancel the task.
pub struct TaskHandle<T> {
    task: Arc<TaskCell>,
    result: Continuation<T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(task: Arc<TaskCell>, result: Continuation<T>) -> Self {
        Self { task, result }
    }

    pub fn id(&self) -> TaskId {
        self.task.id()
    }

    pub fn state(&self) -> TaskState {
        self.task.state()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == TaskState::Terminated
    }

    /// Request cancellation; see [`TaskState`] for when it takes effect.
    /// Returns `false` if the task had already terminated.
    pub fn cancel(&self) -> bool {
        self.task.cancel()
    }

    /// Continuation satisfied with the task's outcome
    pub fn result(&self) -> Continuation<T> {
        self.result.clone()
    }
}

impl<T: Clone> TaskHandle<T> {
    /// Block the calling thread until the task terminates
    pub fn wait(&self) -> Outcome<T> {
        self.result.wait()
    }
}

impl<T: Clone> IntoFuture for TaskHandle<T> {
    type Output = Outcome<T>;
    type IntoFuture = GetResult<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.result.get_result()
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}
