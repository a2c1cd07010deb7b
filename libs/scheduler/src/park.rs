//! Per-worker parking
//!
//! Every worker sleeps on its own parker, so work pushed onto a worker's ring
//! wakes that worker and nobody else. An unpark that lands before the worker
//! parks is remembered and the next park returns at once.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct Parker {
    notified: Mutex<bool>,
    cv: Condvar,
    parked: AtomicBool,
}

impl Parker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sleep until unparked or `timeout` elapses, unless `ready` already holds
    pub(crate) fn park_timeout(&self, timeout: Duration, ready: impl FnOnce() -> bool) {
        let mut notified = self.notified.lock();
        self.parked.store(true, Ordering::SeqCst);
        if !*notified && !ready() {
            self.cv.wait_for(&mut notified, timeout);
        }
        *notified = false;
        self.parked.store(false, Ordering::SeqCst);
    }

    pub(crate) fn unpark(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.cv.notify_one();
    }

    pub(crate) fn is_parked(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_unpark_before_park_is_remembered() {
        let parker = Parker::new();
        parker.unpark();

        let start = Instant::now();
        parker.park_timeout(Duration::from_secs(5), || false);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!parker.is_parked());
    }

    #[test]
    fn test_ready_skips_sleep() {
        let parker = Parker::new();
        let start = Instant::now();
        parker.park_timeout(Duration::from_secs(5), || true);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_unpark_wakes_sleeper() {
        let parker = Arc::new(Parker::new());
        let sleeper = Arc::clone(&parker);
        let t = thread::spawn(move || {
            let start = Instant::now();
            sleeper.park_timeout(Duration::from_secs(10), || false);
            start.elapsed()
        });

        while !parker.is_parked() {
            thread::yield_now();
        }
        parker.unpark();
        assert!(t.join().unwrap() < Duration::from_secs(5));
    }
}
