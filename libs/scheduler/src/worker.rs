//! Worker thread loop

use crate::queue::StealOrder;
use crate::scheduler::Shared;
use crate::task::{AfterPending, TaskCell};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use types::RuntimeEvent;

/// How long a would-be thief waits for the owner to drain its own ring
const STEAL_BACKOFF: Duration = Duration::from_micros(50);

thread_local! {
    /// (scheduler id, worker index) of the worker running on this thread
    static CURRENT: Cell<Option<(u64, usize)>> = const { Cell::new(None) };
}

/// Index of the worker executing the calling code, if any
pub fn current_worker() -> Option<usize> {
    CURRENT.with(|c| c.get()).map(|(_, index)| index)
}

/// Worker index on this thread, only if it belongs to scheduler `scheduler_id`
pub(crate) fn current_worker_of(scheduler_id: u64) -> Option<usize> {
    CURRENT
        .with(|c| c.get())
        .and_then(|(id, index)| (id == scheduler_id).then_some(index))
}

pub(crate) struct Worker {
    index: usize,
    shared: Arc<Shared>,
    steal_order: StealOrder,
    rng: StdRng,
}

impl Worker {
    pub(crate) fn new(index: usize, shared: Arc<Shared>) -> Self {
        let steal_order = StealOrder::new(index, shared.domains());
        Self {
            index,
            shared,
            steal_order,
            rng: StdRng::seed_from_u64(index as u64 + 1),
        }
    }

    pub(crate) fn run_loop(mut self) {
        CURRENT.with(|c| c.set(Some((self.shared.id(), self.index))));
        debug!(worker = self.index, "worker started");

        loop {
            if let Some(task) = self.next_task() {
                self.run_task(task);
                continue;
            }
            if self.shared.is_stopping() {
                break;
            }
            let steal_order = &self.steal_order;
            let queues = self.shared.queues();
            self.shared
                .park_idle(self.index, || steal_order.has_victim(queues));
        }

        CURRENT.with(|c| c.set(None));
        debug!(worker = self.index, "worker stopped");
    }

    /// Local ring, then the shared injector, then a steal
    fn next_task(&mut self) -> Option<Arc<TaskCell>> {
        if let Some(task) = self.next_own() {
            return Some(task);
        }
        if !self.steal_order.has_victim(self.shared.queues()) {
            return None;
        }

        // the owner may be about to finish; steal only what it still can't reach
        let deadline = Instant::now() + STEAL_BACKOFF;
        while Instant::now() < deadline {
            if let Some(task) = self.next_own() {
                return Some(task);
            }
            std::thread::yield_now();
        }

        let stolen = self
            .steal_order
            .steal(self.shared.queues(), &mut self.rng)?;
        self.shared.stats().stolen.fetch_add(1, Ordering::Relaxed);
        trace!(worker = self.index, task_id = %stolen.id(), "stole task");
        Some(stolen)
    }

    fn next_own(&self) -> Option<Arc<TaskCell>> {
        self.shared
            .queue(self.index)
            .and_then(|q| q.pop())
            .or_else(|| self.shared.injector().pop())
    }

    fn run_task(&self, task: Arc<TaskCell>) {
        if let Some(queue) = self.shared.queue(self.index) {
            queue.set_busy(true);
        }
        self.execute(task);
        if let Some(queue) = self.shared.queue(self.index) {
            queue.set_busy(false);
        }
    }

    fn execute(&self, task: Arc<TaskCell>) {
        if !task.try_activate() {
            // stale entry for a task that was cancelled while queued
            return;
        }
        task.claim_home(self.index);

        if task.mark_ran() {
            self.shared.stats().resumed.fetch_add(1, Ordering::Relaxed);
            self.shared
                .emit(&RuntimeEvent::TaskResumed { task_id: task.id() });
        }

        if task.abort_if_requested() {
            return;
        }

        let waker = Waker::from(Arc::clone(&task));
        let mut cx = Context::from_waker(&waker);

        match task.poll(&mut cx) {
            Poll::Ready(kind) => {
                task.complete(kind);
                self.shared.task_terminated(task.id(), kind);
            }
            Poll::Pending => match task.after_pending() {
                AfterPending::Suspended => {
                    self.shared.stats().suspended.fetch_add(1, Ordering::Relaxed);
                    self.shared.emit(&RuntimeEvent::TaskSuspended {
                        task_id: task.id(),
                        worker: self.index,
                    });
                }
                AfterPending::Requeue => self.shared.schedule(task),
                AfterPending::Cancelled => task.finish_cancelled(),
            },
        }
    }
}

/// Give other tasks on this worker a chance to run
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`]
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
