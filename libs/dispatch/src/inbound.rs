//! Inbound parcels
//!
//! A decoded parcel is dispatched exactly as a local invocation would be:
//! resolve, look up the action, spawn one task. Whatever happens, a parcel
//! that names a continuation gets exactly one reply, including when the task
//! is refused or cancelled before it finishes.

use crate::applier::Applier;
use codec::{Parcel, ReplyBody, PARCEL_HEADER_SIZE};
use futures::FutureExt;
use scheduler::panic_message;
use std::panic::AssertUnwindSafe;
use tracing::{debug, warn};
use types::{Gid, Outcome, Result, RuntimeError, RuntimeEvent};

impl Applier {
    /// Decode raw parcel bytes from the transport and dispatch them.
    ///
    /// Undecodable bytes are rejected with `MalformedParcel`. Other errors
    /// have already been replied to the sender's continuation.
    pub fn on_parcel_received(&self, bytes: &[u8]) -> Result<()> {
        let parcel = match codec::deserialize_with(bytes, &self.options.decode) {
            Ok(parcel) => parcel,
            Err(err) => {
                let err = RuntimeError::from(err);
                self.events.emit(&RuntimeEvent::ParcelRejected {
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };
        self.dispatch_parcel(parcel)
    }

    /// Dispatch an already decoded parcel
    pub fn dispatch_parcel(&self, parcel: Parcel) -> Result<()> {
        self.events.emit(&RuntimeEvent::ParcelReceived {
            destination: parcel.destination(),
            action_id: parcel.action_id(),
            bytes: parcel.payload().len() + PARCEL_HEADER_SIZE,
        });

        if parcel.is_reply() {
            return self.deliver_reply(parcel);
        }

        let destination = parcel.destination();
        let continuation = parcel.continuation();

        let location = match self.resolve(destination) {
            Ok(location) => location,
            Err(err) => return self.refuse(continuation, err),
        };

        if location.locality != self.locality {
            if parcel.is_forwarded() {
                // one relay hop at most
                warn!(gid = %destination, to = %location.locality, "forwarded parcel not hosted here");
                let err = RuntimeError::UnknownIdentity { gid: destination };
                return self.refuse(continuation, err);
            }
            debug!(gid = %destination, to = %location.locality, "forwarding parcel");
            return match self.send_parcel(location.locality, parcel.into_forwarded()) {
                Ok(()) => Ok(()),
                Err(err) => self.refuse(continuation, err),
            };
        }

        let descriptor = match self.actions.get(parcel.action_id()) {
            Some(descriptor) => descriptor,
            None => {
                let err = RuntimeError::UnknownAction {
                    action_id: parcel.action_id(),
                };
                return self.refuse(continuation, err);
            }
        };

        let component = match self.components.get_erased(destination, location.handle) {
            Ok(component) => component,
            Err(err) => return self.refuse(continuation, err),
        };

        if self.scheduler.is_shut_down() {
            return self.refuse(continuation, RuntimeError::ShutDown);
        }

        let payload = parcel.payload().clone();
        let reply = ReplyGuard {
            applier: self.clone(),
            continuation,
            sent: false,
        };
        let task = async move {
            let result = AssertUnwindSafe(descriptor.call(destination, component, payload))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(RuntimeError::TaskPanicked {
                        message: panic_message(panic.as_ref()),
                    })
                });
            reply.send(result.map(|bytes| bytes.to_vec()));
        };

        let handle = match self.next_inbound_worker() {
            Some(worker) => self.scheduler.spawn_on(worker, task),
            None => self.scheduler.spawn(task),
        };
        // shut down after the check above; the dropped guard has replied
        if let Some(Outcome::Failed(err)) = handle.result().try_get() {
            return Err(err.clone());
        }
        Ok(())
    }

    /// Return the result of a parcel-initiated action to its continuation
    pub(crate) fn send_reply(&self, continuation: Option<Gid>, body: ReplyBody) {
        let Some(continuation) = continuation else {
            if let Err(err) = &body {
                debug!(error = %err, "fire-and-forget action failed");
            }
            return;
        };

        let home = continuation.home_locality();
        if home == self.locality {
            self.pending.complete(continuation, body);
            return;
        }

        let sent = Parcel::reply(continuation, &body)
            .map_err(RuntimeError::from)
            .and_then(|parcel| self.send_parcel(home, parcel));
        if let Err(err) = sent {
            warn!(continuation = %continuation, locality = %home, error = %err, "reply not delivered");
        }
    }

    fn deliver_reply(&self, parcel: Parcel) -> Result<()> {
        let continuation = parcel.destination();
        let home = continuation.home_locality();
        if home != self.locality {
            return self.send_parcel(home, parcel);
        }

        let body = parcel.reply_body().unwrap_or_else(|err| Err(err.into()));
        self.pending.complete(continuation, body);
        Ok(())
    }

    /// Reply `err` to the sender (if it waits for one) and report it
    fn refuse(&self, continuation: Option<Gid>, err: RuntimeError) -> Result<()> {
        self.send_reply(continuation, Err(err.clone()));
        Err(err)
    }
}

/// Reply owed by an inbound task.
///
/// Travels inside the task body. A body dropped before it replied (refused
/// at spawn, or cancelled while queued or suspended) answers `Cancelled`.
struct ReplyGuard {
    applier: Applier,
    continuation: Option<Gid>,
    sent: bool,
}

impl ReplyGuard {
    fn send(mut self, body: ReplyBody) {
        self.sent = true;
        self.applier.send_reply(self.continuation, body);
    }
}

impl Drop for ReplyGuard {
    fn drop(&mut self) {
        if !self.sent {
            debug!(continuation = ?self.continuation, "inbound task ended without a result");
            self.applier
                .send_reply(self.continuation, Err(RuntimeError::Cancelled));
        }
    }
}
