//! Outstanding remote invocations awaiting their reply parcel

use codec::{args, ReplyBody};
use dashmap::DashMap;
use scheduler::Continuation;
use serde::de::DeserializeOwned;
use tracing::debug;
use types::{Gid, Outcome, RuntimeError};

type Completer = Box<dyn FnOnce(ReplyBody) + Send + Sync>;

/// Continuations waiting on other localities, keyed by continuation GID
#[derive(Default)]
pub struct PendingReplies {
    waiting: DashMap<Gid, Completer>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `continuation` until a reply addressed to `gid` arrives
    pub fn insert<T>(&self, gid: Gid, continuation: Continuation<T>)
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let completer: Completer = Box::new(move |body| {
            let _ = continuation.set_outcome(decode_reply(body));
        });
        self.waiting.insert(gid, completer);
    }

    /// Complete the continuation registered under `gid`.
    /// Returns `false` (and drops the body) if nothing is waiting.
    pub fn complete(&self, gid: Gid, body: ReplyBody) -> bool {
        match self.waiting.remove(&gid) {
            Some((_, completer)) => {
                completer(body);
                true
            }
            None => {
                debug!(continuation = %gid, "reply for unknown continuation dropped");
                false
            }
        }
    }

    /// Fail every outstanding continuation with `err`
    pub fn fail_all(&self, err: RuntimeError) -> usize {
        let gids: Vec<Gid> = self.waiting.iter().map(|entry| *entry.key()).collect();
        gids.into_iter()
            .filter(|gid| self.complete(*gid, Err(err.clone())))
            .count()
    }

    pub fn contains(&self, gid: Gid) -> bool {
        self.waiting.contains_key(&gid)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

impl std::fmt::Debug for PendingReplies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReplies")
            .field("waiting", &self.waiting.len())
            .finish()
    }
}

fn decode_reply<T: DeserializeOwned>(body: ReplyBody) -> Outcome<T> {
    match body {
        Ok(bytes) => match args::decode::<T>(&bytes) {
            Ok(value) => Outcome::Completed(value),
            Err(err) => Outcome::Failed(err.into()),
        },
        Err(RuntimeError::Cancelled) => Outcome::Cancelled,
        Err(err) => Outcome::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::LocalityId;

    fn gid(seq: u64) -> Gid {
        Gid::new(LocalityId::new(0), seq)
    }

    #[test]
    fn test_reply_completes_once() {
        let pending = PendingReplies::new();
        let c: Continuation<f64> = Continuation::new();
        pending.insert(gid(1), c.clone());

        let body = args::encode(&5.5f64).unwrap().to_vec();
        assert!(pending.complete(gid(1), Ok(body.clone())));
        assert_eq!(c.try_get(), Some(&Outcome::Completed(5.5)));

        // duplicate reply is dropped
        assert!(!pending.complete(gid(1), Ok(body)));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_undecodable_reply_fails_continuation() {
        let pending = PendingReplies::new();
        let c: Continuation<String> = Continuation::new();
        pending.insert(gid(2), c.clone());

        pending.complete(gid(2), Ok(vec![1, 2]));
        assert!(matches!(
            c.try_get(),
            Some(Outcome::Failed(RuntimeError::MalformedParcel { .. }))
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PendingReplies>();
        assert_send_sync::<crate::Applier>();

        let pending = std::sync::Arc::new(PendingReplies::new());
        let c: Continuation<u8> = Continuation::new();
        pending.insert(gid(5), c.clone());

        let replier = std::sync::Arc::clone(&pending);
        std::thread::spawn(move || replier.complete(gid(5), Ok(vec![9])))
            .join()
            .unwrap();
        assert_eq!(c.try_get(), Some(&Outcome::Completed(9)));
    }

    #[test]
    fn test_fail_all_cancels() {
        let pending = PendingReplies::new();
        let a: Continuation<u8> = Continuation::new();
        let b: Continuation<u8> = Continuation::new();
        pending.insert(gid(3), a.clone());
        pending.insert(gid(4), b.clone());

        assert_eq!(pending.fail_all(RuntimeError::Cancelled), 2);
        assert_eq!(a.try_get(), Some(&Outcome::Cancelled));
        assert_eq!(b.try_get(), Some(&Outcome::Cancelled));
    }
}
