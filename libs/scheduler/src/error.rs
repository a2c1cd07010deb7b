//! Scheduler construction errors
//!
//! Task-level failures never surface here; they are delivered as
//! [`types::Outcome`] values through each task's continuation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration cannot produce a working pool
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// The OS refused to start a worker thread
    #[error("Failed to spawn worker thread {index}: {source}")]
    ThreadSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },
}
