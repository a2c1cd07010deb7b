//! Run queues
//!
//! Each worker owns a fixed-capacity ring; a full ring spills into the shared
//! injector, which is also where tasks spawned from outside any worker land.
//! Other workers pop from a ring only while its owner is busy running a task,
//! which is how stealing works.

use crate::task::TaskCell;
use crossbeam_queue::{ArrayQueue, SegQueue};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) type Injector = SegQueue<Arc<TaskCell>>;

/// Bounded per-worker run queue
#[derive(Debug)]
pub(crate) struct LocalQueue {
    ring: ArrayQueue<Arc<TaskCell>>,
    /// Owner is inside a poll
    busy: AtomicBool,
}

impl LocalQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            ring: ArrayQueue::new(capacity.max(1)),
            busy: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Work the owner cannot get to right now
    pub(crate) fn is_stealable(&self) -> bool {
        self.is_busy() && !self.is_empty()
    }

    /// Push onto the ring, or onto `overflow` when the ring is full
    pub(crate) fn push(&self, task: Arc<TaskCell>, overflow: &Injector) {
        if let Err(task) = self.ring.push(task) {
            overflow.push(task);
        }
    }

    pub(crate) fn pop(&self) -> Option<Arc<TaskCell>> {
        self.ring.pop()
    }

    pub(crate) fn len(&self) -> usize {
        self.ring.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Steal order for one worker: same-domain victims first, then the rest
#[derive(Debug, Clone)]
pub(crate) struct StealOrder {
    near: Vec<usize>,
    far: Vec<usize>,
}

impl StealOrder {
    pub(crate) fn new(worker: usize, domains: &[usize]) -> Self {
        let own = domains.get(worker).copied().unwrap_or(0);
        let (near, far): (Vec<usize>, Vec<usize>) = (0..domains.len())
            .filter(|&w| w != worker)
            .partition(|&w| domains[w] == own);
        Self { near, far }
    }

    /// Whether any victim currently has stealable work
    pub(crate) fn has_victim(&self, queues: &[LocalQueue]) -> bool {
        self.near
            .iter()
            .chain(&self.far)
            .any(|&w| queues.get(w).is_some_and(LocalQueue::is_stealable))
    }

    /// Pop from the first stealable victim, starting each group at a random index
    pub(crate) fn steal<R: Rng>(
        &self,
        queues: &[LocalQueue],
        rng: &mut R,
    ) -> Option<Arc<TaskCell>> {
        steal_from(&self.near, queues, rng).or_else(|| steal_from(&self.far, queues, rng))
    }
}

fn steal_from<R: Rng>(
    victims: &[usize],
    queues: &[LocalQueue],
    rng: &mut R,
) -> Option<Arc<TaskCell>> {
    if victims.is_empty() {
        return None;
    }

    let len = victims.len();
    let start = rng.gen_range(0..len);
    for i in 0..len {
        let victim = victims[(start + i) % len];
        let Some(queue) = queues.get(victim).filter(|q| q.is_busy()) else {
            continue;
        };
        if let Some(task) = queue.pop() {
            return Some(task);
        }
    }
    None
}
