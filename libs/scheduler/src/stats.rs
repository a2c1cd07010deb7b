//! Scheduler counters

use std::sync::atomic::{AtomicU64, Ordering};
use types::TerminationKind;

/// Live counters, updated with relaxed atomics from every worker
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub spawned: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
    pub cancelled: AtomicU64,
    pub stolen: AtomicU64,
    pub suspended: AtomicU64,
    pub resumed: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub spawned: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub stolen: u64,
    pub suspended: u64,
    pub resumed: u64,
}

impl StatsSnapshot {
    /// Tasks that reached a terminal state
    pub fn terminated(&self) -> u64 {
        self.completed + self.failed + self.cancelled
    }
}

impl SchedulerStats {
    pub(crate) fn record_termination(&self, kind: TerminationKind) {
        let counter = match kind {
            TerminationKind::Completed => &self.completed,
            TerminationKind::Failed => &self.failed,
            TerminationKind::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            spawned: self.spawned.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            stolen: self.stolen.load(Ordering::Relaxed),
            suspended: self.suspended.load(Ordering::Relaxed),
            resumed: self.resumed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_termination_counters() {
        let stats = SchedulerStats::default();
        stats.record_termination(TerminationKind::Completed);
        stats.record_termination(TerminationKind::Completed);
        stats.record_termination(TerminationKind::Cancelled);

        let snap = stats.snapshot();
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.cancelled, 1);
        assert_eq!(snap.terminated(), 3);
    }
}
