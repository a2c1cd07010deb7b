//! # Lightweight Task Scheduler
//!
//! Runs a very large number of short-lived tasks on a small, fixed pool of
//! worker threads.
//!
//! ## Architecture
//!
//! ```text
//!   spawn (off-worker) ──► injector (SegQueue) ◄── ring overflow
//!                               │
//!   spawn (on worker) ──► worker ring (ArrayQueue) ──► run loop ──► poll
//!                               ▲          steal (same domain first)
//!                               └── wake: back onto the home worker's ring
//! ```
//!
//! Each worker parks on its own parker and is woken when its ring gets work.
//! Idle workers steal only from rings whose owner is busy running a task.
//!
//! Tasks are futures. A task suspends when it awaits an unset
//! [`Continuation`]; its worker moves on immediately. Setting the
//! continuation re-queues every waiter on the worker it last ran on.
//!
//! ## Example
//!
//! ```rust
//! use scheduler::{Continuation, Scheduler, SchedulerConfig};
//! use types::Outcome;
//!
//! let sched = Scheduler::new(SchedulerConfig::with_workers(2)).unwrap();
//! let gate: Continuation<u32> = Continuation::new();
//! let reader = gate.clone();
//! let task = sched.spawn(async move { reader.await.into_result().unwrap() + 1 });
//!
//! gate.set_value(41).unwrap();
//! assert_eq!(task.wait(), Outcome::Completed(42));
//! sched.shutdown();
//! ```

pub mod config;
pub mod continuation;
pub mod error;
pub mod handle;
mod park;
mod queue;
mod scheduler;
pub mod stats;
mod task;
mod worker;

pub use config::SchedulerConfig;
pub use continuation::{Continuation, GetResult};
pub use error::SchedulerError;
pub use handle::TaskHandle;
pub use scheduler::{panic_message, Scheduler};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use task::TaskState;
pub use worker::{current_worker, yield_now, YieldNow};
