//! One participating process of the runtime

use crate::action::{Action, ActionRegistry};
use crate::applier::{Applier, DispatchOptions};
use crate::component::{Component, ComponentStore};
use crate::pending::PendingReplies;
use crate::registry::{GidRegistry, Location};
use crate::transport::{NoRemoteTransport, Transport};
use codec::DecodeOptions;
use runtime_config::{ParcelPlacement, RuntimeConfig};
use scheduler::{Continuation, Scheduler, SchedulerConfig, SchedulerError};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tracing::info;
use types::{ActionId, Gid, LocalityId, Result, RuntimeError, SharedEventSink, TracingEventSink};

/// Scheduler, registries and applier of one locality.
///
/// Cloning is cheap; all clones share state.
#[derive(Clone, Debug)]
pub struct Locality {
    applier: Applier,
}

impl Locality {
    pub fn builder(id: LocalityId) -> LocalityBuilder {
        LocalityBuilder::new(id)
    }

    /// Build from loaded configuration
    pub fn from_config(
        config: &RuntimeConfig,
        transport: Arc<dyn Transport>,
    ) -> std::result::Result<Self, SchedulerError> {
        Self::builder(LocalityId::new(config.locality.id))
            .scheduler_config(SchedulerConfig::from(&config.scheduler))
            .placement(config.parcel.placement)
            .decode_options(DecodeOptions {
                verify_checksum: config.parcel.verify_checksum,
                max_payload_bytes: config.parcel.max_payload_bytes,
            })
            .transport(transport)
            .build()
    }

    pub fn id(&self) -> LocalityId {
        self.applier.locality
    }

    pub fn applier(&self) -> &Applier {
        &self.applier
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.applier.scheduler
    }

    pub fn registry(&self) -> &GidRegistry {
        &self.applier.registry
    }

    pub fn components(&self) -> &ComponentStore {
        &self.applier.components
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.applier.actions
    }

    pub fn pending(&self) -> &PendingReplies {
        &self.applier.pending
    }

    /// Make `A` executable on behalf of inbound parcels
    pub fn register_action<A: Action>(&self) -> Result<ActionId> {
        self.applier.actions.register::<A>()
    }

    /// Host `component` here under a fresh GID
    pub fn create_component<C: Component>(&self, component: C) -> Result<Gid> {
        let handle = self.applier.components.insert(component);
        let gid = self.applier.registry.allocate();
        self.applier.registry.register(gid, self.id(), handle)?;
        Ok(gid)
    }

    /// Release `gid`; drops the instance if it is hosted here
    pub fn destroy_component(&self, gid: Gid) -> Result<()> {
        let location = self.applier.registry.release(gid)?;
        if location.locality == self.id() {
            self.applier.components.remove(location.handle);
        }
        Ok(())
    }

    /// Record where a GID created elsewhere lives
    pub fn register_remote(&self, gid: Gid, location: Location) -> Result<()> {
        self.applier
            .registry
            .register(gid, location.locality, location.handle)
    }

    pub fn invoke<A: Action>(&self, gid: Gid, args: A::Args) -> Continuation<A::Output> {
        self.applier.invoke::<A>(gid, args)
    }

    pub fn apply<A: Action>(&self, gid: Gid, args: A::Args) -> Result<()> {
        self.applier.apply::<A>(gid, args)
    }

    /// Inbound callback for the transport
    pub fn on_parcel_received(&self, bytes: &[u8]) -> Result<()> {
        self.applier.on_parcel_received(bytes)
    }

    /// Fail outstanding remote invocations with `Cancelled` and stop the
    /// scheduler, cancelling suspended tasks
    pub fn shutdown(&self) {
        let failed = self.applier.pending.fail_all(RuntimeError::Cancelled);
        self.applier.scheduler.shutdown();
        info!(locality = %self.id(), failed_replies = failed, "locality shut down");
    }
}

/// Builder for [`Locality`]
pub struct LocalityBuilder {
    id: LocalityId,
    scheduler: SchedulerConfig,
    transport: Arc<dyn Transport>,
    events: SharedEventSink,
    options: DispatchOptions,
}

impl LocalityBuilder {
    fn new(id: LocalityId) -> Self {
        Self {
            id,
            scheduler: SchedulerConfig::default(),
            transport: Arc::new(NoRemoteTransport),
            events: Arc::new(TracingEventSink),
            options: DispatchOptions::default(),
        }
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.scheduler.worker_threads = workers;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Sink shared by the scheduler and the dispatch layer
    pub fn events(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    pub fn placement(mut self, placement: ParcelPlacement) -> Self {
        self.options.placement = placement;
        self
    }

    pub fn decode_options(mut self, decode: DecodeOptions) -> Self {
        self.options.decode = decode;
        self
    }

    pub fn build(self) -> std::result::Result<Locality, SchedulerError> {
        let scheduler = Scheduler::with_event_sink(self.scheduler, Arc::clone(&self.events))?;
        info!(
            locality = %self.id,
            workers = scheduler.worker_count(),
            placement = ?self.options.placement,
            "locality started"
        );

        Ok(Locality {
            applier: Applier {
                locality: self.id,
                registry: Arc::new(GidRegistry::new(self.id)),
                components: Arc::new(ComponentStore::new()),
                actions: Arc::new(ActionRegistry::new()),
                pending: Arc::new(PendingReplies::new()),
                scheduler,
                transport: self.transport,
                events: self.events,
                options: self.options,
                round_robin: Arc::new(AtomicUsize::new(0)),
            },
        })
    }
}
