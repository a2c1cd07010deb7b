//! Applier: local-vs-remote dispatch of typed invocations
//!
//! `invoke` resolves the target GID once. A local target becomes exactly one
//! scheduler task running the typed action; a remote target becomes exactly
//! one parcel handed to the transport, with a continuation GID registered in
//! the pending-reply table. Failures before either step complete the returned
//! continuation immediately.

use crate::action::{Action, ActionRegistry};
use crate::component::ComponentStore;
use crate::pending::PendingReplies;
use crate::registry::{GidRegistry, Location};
use crate::transport::Transport;
use codec::{DecodeOptions, Parcel, PARCEL_HEADER_SIZE};
use runtime_config::ParcelPlacement;
use scheduler::{Continuation, Scheduler};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use types::{ActionId, Gid, LocalityId, Result, RuntimeEvent, SharedEventSink};

/// Dispatch settings of one locality
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Worker that runs tasks created for inbound parcels
    pub placement: ParcelPlacement,
    pub decode: DecodeOptions,
}

/// Location-transparent invoker bound to one locality
#[derive(Clone)]
pub struct Applier {
    pub(crate) locality: LocalityId,
    pub(crate) registry: Arc<GidRegistry>,
    pub(crate) components: Arc<ComponentStore>,
    pub(crate) actions: Arc<ActionRegistry>,
    pub(crate) pending: Arc<PendingReplies>,
    pub(crate) scheduler: Scheduler,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) events: SharedEventSink,
    pub(crate) options: DispatchOptions,
    pub(crate) round_robin: Arc<AtomicUsize>,
}

impl std::fmt::Debug for Applier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Applier")
            .field("locality", &self.locality)
            .field("registered", &self.registry.len())
            .field("pending", &self.pending.len())
            .field("options", &self.options)
            .finish()
    }
}

impl Applier {
    pub fn locality(&self) -> LocalityId {
        self.locality
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Invoke `A` on `gid`; the continuation receives the result wherever
    /// the target lives
    pub fn invoke<A: Action>(&self, gid: Gid, args: A::Args) -> Continuation<A::Output> {
        let location = match self.resolve(gid) {
            Ok(location) => location,
            Err(err) => return Continuation::failed(err),
        };

        if location.locality == self.locality {
            self.invoke_local::<A>(gid, location, args)
        } else {
            self.invoke_remote::<A>(gid, location.locality, args)
        }
    }

    /// Invoke `A` on `gid` without a result channel.
    ///
    /// Errors are only those detected before the task is spawned or the
    /// parcel handed off.
    pub fn apply<A: Action>(&self, gid: Gid, args: A::Args) -> Result<()> {
        let location = self.resolve(gid)?;

        if location.locality == self.locality {
            let component = self
                .components
                .get::<A::Component>(gid, location.handle)?;
            self.scheduler.spawn_try(A::invoke(component, args));
            Ok(())
        } else {
            self.send_invocation(gid, location.locality, A::id(), &args, None)
        }
    }

    fn invoke_local<A: Action>(
        &self,
        gid: Gid,
        location: Location,
        args: A::Args,
    ) -> Continuation<A::Output> {
        let component = match self.components.get::<A::Component>(gid, location.handle) {
            Ok(component) => component,
            Err(err) => return Continuation::failed(err),
        };
        trace!(gid = %gid, action = A::NAME, "local invocation");
        self.scheduler.spawn_try(A::invoke(component, args)).result()
    }

    fn invoke_remote<A: Action>(
        &self,
        gid: Gid,
        destination: LocalityId,
        args: A::Args,
    ) -> Continuation<A::Output> {
        let continuation_gid = self.registry.allocate();
        let continuation = Continuation::new();
        self.pending.insert(continuation_gid, continuation.clone());

        if let Err(err) =
            self.send_invocation(gid, destination, A::id(), &args, Some(continuation_gid))
        {
            debug!(gid = %gid, locality = %destination, error = %err, "remote invocation not sent");
            self.pending.complete(continuation_gid, Err(err));
        }
        continuation
    }

    pub(crate) fn resolve(&self, gid: Gid) -> Result<Location> {
        self.registry.resolve(gid).map_err(|err| {
            self.events.emit(&RuntimeEvent::ResolutionFailed { gid });
            err
        })
    }

    fn send_invocation<T: Serialize + ?Sized>(
        &self,
        gid: Gid,
        destination: LocalityId,
        action_id: ActionId,
        args: &T,
        continuation: Option<Gid>,
    ) -> Result<()> {
        let parcel = Parcel::build(gid, action_id, args, continuation)?;
        self.send_parcel(destination, parcel)
    }

    /// Hand `parcel` to the transport and record it
    pub(crate) fn send_parcel(&self, destination: LocalityId, parcel: Parcel) -> Result<()> {
        let event = RuntimeEvent::ParcelSent {
            destination: parcel.destination(),
            action_id: parcel.action_id(),
            locality: destination,
            bytes: parcel.payload().len() + PARCEL_HEADER_SIZE,
        };
        self.transport.send(destination, parcel)?;
        self.events.emit(&event);
        Ok(())
    }

    /// Worker for a task created on behalf of an inbound parcel
    pub(crate) fn next_inbound_worker(&self) -> Option<usize> {
        match self.options.placement {
            ParcelPlacement::DecodingWorker => None,
            ParcelPlacement::RoundRobin => {
                let next = self.round_robin.fetch_add(1, Ordering::Relaxed);
                Some(next % self.scheduler.worker_count())
            }
        }
    }
}
