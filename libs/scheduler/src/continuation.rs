//! Single-assignment result channel
//!
//! A [`Continuation`] is a shared slot written exactly once. Tasks read it by
//! awaiting [`Continuation::get_result`]; an unset slot registers the task's
//! waker and the task suspends, releasing its worker. The write wakes every
//! registered waiter.
//!
//! Lost wakeups are excluded by ordering: the writer publishes the value
//! before taking the waiter lock, and a reader re-checks the value while
//! holding that lock before it registers.

use crate::handle::TaskHandle;
use crate::scheduler::Scheduler;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};
use types::{Outcome, Result, RuntimeError};

struct Slot<T> {
    value: OnceCell<Outcome<T>>,
    waiters: Mutex<Vec<Option<Waker>>>,
    /// Blocking readers outside any worker
    ready: Condvar,
}

/// Handle to a single-assignment result slot
///
/// Cloning yields another handle to the same slot.
pub struct Continuation<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Clone for Continuation<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Continuation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("ready", &self.is_ready())
            .field("waiters", &self.waiters())
            .finish()
    }
}

impl<T> Continuation<T> {
    /// Unset continuation
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Slot {
                value: OnceCell::new(),
                waiters: Mutex::new(Vec::new()),
                ready: Condvar::new(),
            }),
        }
    }

    /// Continuation that is already satisfied
    pub fn from_outcome(outcome: Outcome<T>) -> Self {
        let continuation = Self::new();
        let _ = continuation.slot.value.set(outcome);
        continuation
    }

    /// Continuation already failed with `err`
    pub fn failed(err: RuntimeError) -> Self {
        Self::from_outcome(Outcome::Failed(err))
    }

    /// Satisfy the slot. Fails with [`RuntimeError::AlreadySatisfied`] on
    /// every call after the first.
    pub fn set_outcome(&self, outcome: Outcome<T>) -> Result<()> {
        self.slot
            .value
            .set(outcome)
            .map_err(|_| RuntimeError::AlreadySatisfied)?;

        let wakers = {
            let mut waiters = self.slot.waiters.lock();
            self.slot.ready.notify_all();
            std::mem::take(&mut *waiters)
        };

        for waker in wakers.into_iter().flatten() {
            waker.wake();
        }
        Ok(())
    }

    /// Satisfy with a value or an error
    pub fn set_result(&self, result: Result<T>) -> Result<()> {
        self.set_outcome(Outcome::from(result))
    }

    pub fn set_value(&self, value: T) -> Result<()> {
        self.set_outcome(Outcome::Completed(value))
    }

    pub fn is_ready(&self) -> bool {
        self.slot.value.get().is_some()
    }

    /// Outcome if already set, without registering interest
    pub fn try_get(&self) -> Option<&Outcome<T>> {
        self.slot.value.get()
    }

    /// Number of registered async waiters
    pub fn waiters(&self) -> usize {
        self.slot.waiters.lock().iter().filter(|w| w.is_some()).count()
    }

    /// Future resolving to the outcome once the slot is set
    pub fn get_result(&self) -> GetResult<T> {
        GetResult {
            slot: Arc::clone(&self.slot),
            index: None,
        }
    }
}

impl<T: Clone> Continuation<T> {
    /// Block the calling OS thread until the slot is set.
    ///
    /// For callers outside the scheduler. A task calling this pins its
    /// worker; tasks should await [`Continuation::get_result`] instead.
    pub fn wait(&self) -> Outcome<T> {
        if let Some(outcome) = self.slot.value.get() {
            return outcome.clone();
        }

        let mut waiters = self.slot.waiters.lock();
        loop {
            if let Some(outcome) = self.slot.value.get() {
                return outcome.clone();
            }
            self.slot.ready.wait(&mut waiters);
        }
    }

    /// Like [`Continuation::wait`], giving up after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome<T>> {
        let deadline = Instant::now() + timeout;
        let mut waiters = self.slot.waiters.lock();
        loop {
            if let Some(outcome) = self.slot.value.get() {
                return Some(outcome.clone());
            }
            if self
                .slot
                .ready
                .wait_until(&mut waiters, deadline)
                .timed_out()
            {
                return self.slot.value.get().cloned();
            }
        }
    }
}

impl<T> Continuation<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Continuation satisfied with `f(outcome)` once this one is set.
    ///
    /// `f` runs as its own task on `scheduler`; the caller does not suspend.
    pub fn then<U, F>(&self, scheduler: &Scheduler, f: F) -> Continuation<U>
    where
        U: Send + Sync + 'static,
        F: FnOnce(Outcome<T>) -> U + Send + 'static,
    {
        let source = self.get_result();
        let handle: TaskHandle<U> = scheduler.spawn(async move { f(source.await) });
        handle.result()
    }
}

impl<T: Clone> IntoFuture for Continuation<T> {
    type Output = Outcome<T>;
    type IntoFuture = GetResult<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.get_result()
    }
}

/// Future returned by [`Continuation::get_result`]
pub struct GetResult<T> {
    slot: Arc<Slot<T>>,
    /// Position in the waiter list once registered
    index: Option<usize>,
}

impl<T: Clone> Future for GetResult<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(outcome) = this.slot.value.get() {
            return Poll::Ready(outcome.clone());
        }

        let mut waiters = this.slot.waiters.lock();
        if let Some(outcome) = this.slot.value.get() {
            return Poll::Ready(outcome.clone());
        }

        match this.index.and_then(|i| waiters.get_mut(i)) {
            Some(Some(existing)) if existing.will_wake(cx.waker()) => {}
            Some(entry) => *entry = Some(cx.waker().clone()),
            None => {
                let waker = Some(cx.waker().clone());
                // reuse a slot left by a dropped reader
                let index = match waiters.iter().position(Option::is_none) {
                    Some(free) => {
                        waiters[free] = waker;
                        free
                    }
                    None => {
                        waiters.push(waker);
                        waiters.len() - 1
                    }
                };
                this.index = Some(index);
            }
        }
        Poll::Pending
    }
}

impl<T> Drop for GetResult<T> {
    fn drop(&mut self) {
        let Some(index) = self.index else {
            return;
        };
        if self.slot.value.get().is_some() {
            return;
        }
        let mut waiters = self.slot.waiters.lock();
        if self.slot.value.get().is_none() {
            if let Some(entry) = waiters.get_mut(index) {
                *entry = None;
            }
            while waiters.last().is_some_and(Option::is_none) {
                waiters.pop();
            }
        }
    }
}

impl<T> fmt::Debug for GetResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetResult")
            .field("registered", &self.index.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker;
    use std::thread;

    #[test]
    fn test_single_assignment() {
        let c = Continuation::new();
        assert!(!c.is_ready());
        assert_eq!(c.set_value(42), Ok(()));
        assert_eq!(c.set_value(43), Err(RuntimeError::AlreadySatisfied));
        assert_eq!(
            c.set_result(Err(RuntimeError::Cancelled)),
            Err(RuntimeError::AlreadySatisfied)
        );
        assert_eq!(c.try_get(), Some(&Outcome::Completed(42)));
    }

    #[test]
    fn test_poll_registers_once() {
        let c: Continuation<u32> = Continuation::new();
        let mut fut = c.get_result();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        assert_eq!(c.waiters(), 1);

        c.set_value(7).unwrap();
        assert_eq!(Pin::new(&mut fut).poll(&mut cx), Poll::Ready(Outcome::Completed(7)));
        assert_eq!(c.waiters(), 0);
    }

    #[test]
    fn test_dropped_reader_unregisters() {
        let c: Continuation<u32> = Continuation::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut fut = c.get_result();
        assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        drop(fut);
        assert_eq!(c.waiters(), 0);
    }

    #[test]
    fn test_abandoned_readers_leave_no_slots() {
        let c: Continuation<u32> = Continuation::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        for _ in 0..100 {
            let mut fut = c.get_result();
            assert!(Pin::new(&mut fut).poll(&mut cx).is_pending());
        }
        assert_eq!(c.slot.waiters.lock().len(), 0);

        // a slot freed in the middle is reused
        let mut first = c.get_result();
        let mut second = c.get_result();
        assert!(Pin::new(&mut first).poll(&mut cx).is_pending());
        assert!(Pin::new(&mut second).poll(&mut cx).is_pending());
        drop(first);
        let mut third = c.get_result();
        assert!(Pin::new(&mut third).poll(&mut cx).is_pending());
        assert_eq!(c.slot.waiters.lock().len(), 2);
        assert_eq!(c.waiters(), 2);

        c.set_value(3).unwrap();
        assert_eq!(Pin::new(&mut second).poll(&mut cx), Poll::Ready(Outcome::Completed(3)));
        assert_eq!(Pin::new(&mut third).poll(&mut cx), Poll::Ready(Outcome::Completed(3)));
    }

    #[test]
    fn test_blocking_wait_across_threads() {
        let c: Continuation<String> = Continuation::new();
        let writer = c.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            writer.set_value("done".to_string()).unwrap();
        });

        assert_eq!(c.wait(), Outcome::Completed("done".to_string()));
        t.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_expires() {
        let c: Continuation<u8> = Continuation::new();
        assert_eq!(c.wait_timeout(Duration::from_millis(5)), None);

        let c: Continuation<u8> = Continuation::failed(RuntimeError::Cancelled);
        assert_eq!(
            c.wait_timeout(Duration::from_millis(5)),
            Some(Outcome::Failed(RuntimeError::Cancelled))
        );
    }

    #[test]
    fn test_futures_executor_await() {
        let c: Continuation<u64> = Continuation::new();
        let writer = c.clone();
        let t = thread::spawn(move || writer.set_value(9).unwrap());
        let outcome = futures::executor::block_on(c.get_result());
        assert_eq!(outcome, Outcome::Completed(9));
        t.join().unwrap();
    }
}
