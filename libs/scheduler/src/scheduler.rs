//! Scheduler: worker pool, spawning, quiescence and shutdown

use crate::config::SchedulerConfig;
use crate::continuation::Continuation;
use crate::error::SchedulerError;
use crate::handle::TaskHandle;
use crate::park::Parker;
use crate::queue::{Injector, LocalQueue};
use crate::stats::{SchedulerStats, StatsSnapshot};
use crate::task::{TaskCell, NO_HOME};
use crate::worker::{self, Worker};
use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use types::{
    Outcome, Result, RuntimeError, RuntimeEvent, SharedEventSink, TaskId, TerminationKind,
    TracingEventSink,
};

static NEXT_SCHEDULER_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by the scheduler handle, its workers and every task's waker
pub(crate) struct Shared {
    id: u64,
    config: SchedulerConfig,
    domains: Vec<usize>,
    queues: Vec<LocalQueue>,
    injector: Injector,
    /// Every task that has not terminated yet
    tasks: DashMap<TaskId, Arc<TaskCell>>,
    next_task_id: AtomicU64,
    live: AtomicUsize,
    accepting: AtomicBool,
    stopping: AtomicBool,
    /// One per worker, same index as `queues`
    parkers: Vec<Parker>,
    /// Rotates which idle worker picks up injector work
    next_unpark: AtomicUsize,
    quiescent_lock: Mutex<()>,
    quiescent_cv: Condvar,
    stats: SchedulerStats,
    events: SharedEventSink,
}

impl Shared {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn domains(&self) -> &[usize] {
        &self.domains
    }

    pub(crate) fn queues(&self) -> &[LocalQueue] {
        &self.queues
    }

    pub(crate) fn queue(&self, worker: usize) -> Option<&LocalQueue> {
        self.queues.get(worker)
    }

    pub(crate) fn injector(&self) -> &Injector {
        &self.injector
    }

    pub(crate) fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub(crate) fn emit(&self, event: &RuntimeEvent) {
        self.events.emit(event);
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Enqueue a runnable task on its home worker's ring and wake that worker.
    ///
    /// Homeless tasks go to the injector and wake one idle worker. A backlog
    /// behind a busy owner also wakes an idle worker, which may steal it.
    pub(crate) fn schedule(&self, task: Arc<TaskCell>) {
        let home = task.home();
        match (self.queues.get(home), self.parkers.get(home)) {
            (Some(queue), Some(parker)) => {
                queue.push(task, &self.injector);
                parker.unpark();
                if queue.is_busy() && queue.len() > 1 {
                    self.unpark_idle();
                }
            }
            _ => {
                self.injector.push(task);
                self.unpark_idle();
            }
        }
    }

    /// Wake one parked worker, if any
    fn unpark_idle(&self) {
        let workers = self.parkers.len();
        let start = self.next_unpark.fetch_add(1, Ordering::Relaxed);
        for i in 0..workers {
            let parker = &self.parkers[(start + i) % workers];
            if parker.is_parked() {
                parker.unpark();
                return;
            }
        }
    }

    fn unpark_all(&self) {
        self.parkers.iter().for_each(Parker::unpark);
    }

    /// Sleep until woken, shutdown starts or the park interval elapses
    pub(crate) fn park_idle(&self, worker: usize, can_steal: impl FnOnce() -> bool) {
        let Some(parker) = self.parkers.get(worker) else {
            return;
        };
        parker.park_timeout(self.config.idle_park, || {
            self.is_stopping()
                || !self.injector.is_empty()
                || self.queues.get(worker).is_some_and(|q| !q.is_empty())
                || can_steal()
        });
    }

    /// Bookkeeping for a task that reached its terminal state
    pub(crate) fn task_terminated(&self, id: TaskId, kind: TerminationKind) {
        self.tasks.remove(&id);
        self.stats.record_termination(kind);
        self.emit(&RuntimeEvent::TaskTerminated { task_id: id, kind });

        if self.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.quiescent_lock.lock();
            self.quiescent_cv.notify_all();
        }
    }

    fn cancel_outstanding(&self) -> usize {
        let outstanding: Vec<Arc<TaskCell>> =
            self.tasks.iter().map(|entry| Arc::clone(entry.value())).collect();
        outstanding.iter().filter(|task| task.cancel()).count()
    }
}

struct Inner {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    fn shutdown(&self) {
        let shared = &self.shared;
        if shared.accepting.swap(false, Ordering::SeqCst) {
            info!(
                live = shared.live.load(Ordering::Relaxed),
                "scheduler shutting down"
            );
        }

        let cancelled = shared.cancel_outstanding();
        if cancelled > 0 {
            warn!(cancelled, "cancelled outstanding tasks at shutdown");
        }

        shared.stopping.store(true, Ordering::SeqCst);
        shared.unpark_all();

        let own = worker::current_worker_of(shared.id);
        let handles: Vec<_> = std::mem::take(&mut *self.threads.lock());
        for (index, handle) in handles.into_iter().enumerate() {
            if Some(index) == own {
                // called from one of our own workers; it exits on its own
                continue;
            }
            if handle.join().is_err() {
                warn!(worker = index, "worker thread panicked");
            }
        }

        // anything woken after the workers left
        shared.cancel_outstanding();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Where a new task is queued
#[derive(Debug, Clone, Copy)]
enum Placement {
    /// The spawning worker's ring, or the injector off-worker
    Current,
    Worker(usize),
}

/// Cooperative work-stealing scheduler for lightweight tasks
///
/// Cloning yields another handle to the same pool. The pool shuts down when
/// [`Scheduler::shutdown`] is called or the last handle is dropped.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = &self.inner.shared;
        f.debug_struct("Scheduler")
            .field("id", &shared.id)
            .field("workers", &shared.queues.len())
            .field("live", &shared.live.load(Ordering::Relaxed))
            .finish()
    }
}

impl Scheduler {
    /// Start a pool that reports events through `tracing`
    pub fn new(config: SchedulerConfig) -> std::result::Result<Self, SchedulerError> {
        Self::with_event_sink(config, Arc::new(TracingEventSink))
    }

    pub fn with_event_sink(
        config: SchedulerConfig,
        events: SharedEventSink,
    ) -> std::result::Result<Self, SchedulerError> {
        config.validate()?;

        let workers = config.worker_threads;
        let domains = (0..workers).map(|w| config.domain_of(w)).collect();
        let queues = (0..workers)
            .map(|_| LocalQueue::new(config.queue_capacity))
            .collect();

        let shared = Arc::new(Shared {
            id: NEXT_SCHEDULER_ID.fetch_add(1, Ordering::Relaxed),
            config: config.clone(),
            domains,
            queues,
            injector: Injector::new(),
            tasks: DashMap::new(),
            next_task_id: AtomicU64::new(1),
            live: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            stopping: AtomicBool::new(false),
            parkers: (0..workers).map(|_| Parker::new()).collect(),
            next_unpark: AtomicUsize::new(0),
            quiescent_lock: Mutex::new(()),
            quiescent_cv: Condvar::new(),
            stats: SchedulerStats::default(),
            events,
        });

        let inner = Arc::new(Inner {
            shared: Arc::clone(&shared),
            threads: Mutex::new(Vec::with_capacity(workers)),
        });

        for index in 0..workers {
            let worker = Worker::new(index, Arc::clone(&shared));
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || worker.run_loop())
                .map_err(|source| SchedulerError::ThreadSpawn { index, source })?;
            inner.threads.lock().push(handle);
        }

        info!(
            workers,
            queue_capacity = config.queue_capacity,
            numa_domains = config.numa_domains,
            "scheduler started"
        );
        Ok(Self { inner })
    }

    fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    /// Spawn a task on the calling worker's queue (the shared queue off-worker)
    pub fn spawn<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.spawn_outcome(Placement::Current, future.map(Outcome::Completed))
    }

    /// Spawn a fallible task; an `Err` becomes a failed outcome
    pub fn spawn_try<F, T>(&self, future: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.spawn_outcome(Placement::Current, future.map(Outcome::from))
    }

    /// Spawn on a specific worker's queue (index taken modulo the pool size)
    pub fn spawn_on<F, T>(&self, worker: usize, future: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.spawn_outcome(Placement::Worker(worker), future.map(Outcome::Completed))
    }

    pub fn spawn_try_on<F, T>(&self, worker: usize, future: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.spawn_outcome(Placement::Worker(worker), future.map(Outcome::from))
    }

    fn spawn_outcome<F, T>(&self, placement: Placement, future: F) -> TaskHandle<T>
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let shared = self.shared();
        let id = TaskId::new(shared.next_task_id.fetch_add(1, Ordering::Relaxed));
        let result = Continuation::new();

        if !shared.accepting.load(Ordering::SeqCst) {
            let _ = result.set_outcome(Outcome::Failed(RuntimeError::ShutDown));
            return TaskHandle::new(Arc::new(TaskCell::terminated(id)), result);
        }

        let cancel_requested = Arc::new(AtomicBool::new(false));
        let body = {
            let result = result.clone();
            let cancel_requested = Arc::clone(&cancel_requested);
            async move {
                let outcome = match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        warn!(task_id = %id, message = %message, "task panicked");
                        Outcome::Failed(RuntimeError::TaskPanicked { message })
                    }
                };
                let outcome = if cancel_requested.load(Ordering::Acquire) {
                    Outcome::Cancelled
                } else {
                    outcome
                };
                let kind = termination_kind(&outcome);
                let _ = result.set_outcome(outcome);
                kind
            }
            .boxed()
        };
        let on_cancel = {
            let result = result.clone();
            Box::new(move || {
                let _ = result.set_outcome(Outcome::Cancelled);
            })
        };

        let workers = shared.queues.len();
        let home = match placement {
            Placement::Worker(index) => index % workers,
            Placement::Current => worker::current_worker_of(shared.id).unwrap_or(NO_HOME),
        };

        let task = Arc::new(TaskCell::new(
            id,
            home,
            body,
            cancel_requested,
            on_cancel,
            Arc::downgrade(shared),
        ));

        shared.live.fetch_add(1, Ordering::AcqRel);
        shared.tasks.insert(id, Arc::clone(&task));
        shared.stats.spawned.fetch_add(1, Ordering::Relaxed);
        shared.emit(&RuntimeEvent::TaskSpawned {
            task_id: id,
            worker: (home != NO_HOME).then_some(home),
        });
        shared.schedule(Arc::clone(&task));

        // raced with shutdown after the accepting check
        if !shared.accepting.load(Ordering::SeqCst) {
            task.cancel();
        }

        TaskHandle::new(task, result)
    }

    pub fn worker_count(&self) -> usize {
        self.shared().queues.len()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared().config
    }

    /// Worker index of the caller, if it runs on one of this scheduler's workers
    pub fn current_worker(&self) -> Option<usize> {
        worker::current_worker_of(self.shared().id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared().stats.snapshot()
    }

    /// Tasks spawned and not yet terminated, suspended ones included
    pub fn live_tasks(&self) -> usize {
        self.shared().live.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        !self.shared().accepting.load(Ordering::Acquire)
    }

    /// Block until every task has terminated. Must not be called from a task.
    pub fn wait_quiescent(&self) {
        let shared = self.shared();
        let mut guard = shared.quiescent_lock.lock();
        while shared.live.load(Ordering::Acquire) > 0 {
            shared.quiescent_cv.wait(&mut guard);
        }
    }

    /// [`Scheduler::wait_quiescent`] with a deadline; returns whether quiescence was reached
    pub fn wait_quiescent_timeout(&self, timeout: Duration) -> bool {
        let shared = self.shared();
        let deadline = Instant::now() + timeout;
        let mut guard = shared.quiescent_lock.lock();
        while shared.live.load(Ordering::Acquire) > 0 {
            if shared
                .quiescent_cv
                .wait_until(&mut guard, deadline)
                .timed_out()
            {
                return shared.live.load(Ordering::Acquire) == 0;
            }
        }
        true
    }

    /// Stop accepting work, cancel outstanding tasks and join the workers.
    ///
    /// Suspended and queued tasks terminate with a cancelled outcome; running
    /// tasks terminate at their next suspension point. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Wait for quiescence, then shut down
    pub fn shutdown_graceful(&self) {
        self.wait_quiescent();
        self.shutdown();
    }
}

fn termination_kind<T>(outcome: &Outcome<T>) -> TerminationKind {
    match outcome {
        Outcome::Completed(_) => TerminationKind::Completed,
        Outcome::Failed(_) => TerminationKind::Failed,
        Outcome::Cancelled => TerminationKind::Cancelled,
    }
}

/// Readable message of a caught panic payload
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
