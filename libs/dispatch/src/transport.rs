//! Transport boundary
//!
//! The dispatch layer hands finished parcels to a [`Transport`] together with
//! the destination locality; delivery (sockets, RDMA, retries) is the
//! transport's concern. Inbound bytes come back through
//! [`crate::Locality::on_parcel_received`].
//!
//! [`ChannelNetwork`] is an in-process transport over `tokio` channels. Every
//! parcel is fully serialized on send and decoded on receipt, so a set of
//! localities joined to one network behaves like a real deployment.

use crate::locality::Locality;
use bytes::Bytes;
use codec::Parcel;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use types::{LocalityId, Result, RuntimeError};

/// Outbound half of the parcel layer
pub trait Transport: Send + Sync {
    fn send(&self, destination: LocalityId, parcel: Parcel) -> Result<()>;
}

/// Transport of a single-locality process: every send fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemoteTransport;

impl Transport for NoRemoteTransport {
    fn send(&self, destination: LocalityId, _parcel: Parcel) -> Result<()> {
        Err(RuntimeError::transport(
            destination,
            "no transport configured for remote localities",
        ))
    }
}

/// Send-side counters
#[derive(Debug, Default)]
pub struct TransportMetrics {
    pub parcels_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub send_failures: AtomicU64,
}

impl TransportMetrics {
    pub fn parcels_sent(&self) -> u64 {
        self.parcels_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

type Routes = DashMap<LocalityId, mpsc::UnboundedSender<Bytes>>;

/// In-process "network" connecting localities through channels
#[derive(Debug, Clone)]
pub struct ChannelNetwork {
    routes: Arc<Routes>,
    max_payload_bytes: usize,
}

impl Default for ChannelNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelNetwork {
    pub fn new() -> Self {
        Self::with_max_payload(codec::DEFAULT_MAX_PAYLOAD_BYTES)
    }

    pub fn with_max_payload(max_payload_bytes: usize) -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
            max_payload_bytes,
        }
    }

    /// Attach `locality`: returns its outbound transport and inbound mailbox.
    /// Re-joining replaces the previous mailbox.
    pub fn join(&self, locality: LocalityId) -> (ChannelTransport, Mailbox) {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.routes.insert(locality, sender);
        debug!(locality = %locality, "joined channel network");

        let transport = ChannelTransport {
            local: locality,
            routes: Arc::clone(&self.routes),
            max_payload_bytes: self.max_payload_bytes,
            metrics: Arc::new(TransportMetrics::default()),
        };
        let mailbox = Mailbox { locality, receiver };
        (transport, mailbox)
    }

    /// Detach `locality`; later sends to it fail
    pub fn leave(&self, locality: LocalityId) -> bool {
        self.routes.remove(&locality).is_some()
    }

    pub fn members(&self) -> Vec<LocalityId> {
        let mut members: Vec<_> = self.routes.iter().map(|entry| *entry.key()).collect();
        members.sort();
        members
    }
}

/// Outbound side of one locality on a [`ChannelNetwork`]
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    local: LocalityId,
    routes: Arc<Routes>,
    max_payload_bytes: usize,
    metrics: Arc<TransportMetrics>,
}

impl ChannelTransport {
    pub fn local(&self) -> LocalityId {
        self.local
    }

    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    fn try_send(&self, destination: LocalityId, parcel: &Parcel) -> Result<usize> {
        let bytes = codec::serialize_with_limit(parcel, self.max_payload_bytes)?;
        let len = bytes.len();
        let route = self
            .routes
            .get(&destination)
            .ok_or_else(|| RuntimeError::transport(destination, "no route to locality"))?;
        route
            .send(bytes)
            .map_err(|_| RuntimeError::transport(destination, "mailbox closed"))?;
        Ok(len)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, destination: LocalityId, parcel: Parcel) -> Result<()> {
        match self.try_send(destination, &parcel) {
            Ok(len) => {
                self.metrics.parcels_sent.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .bytes_sent
                    .fetch_add(len as u64, Ordering::Relaxed);
                trace!(from = %self.local, to = %destination, bytes = len, "parcel queued");
                Ok(())
            }
            Err(err) => {
                self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }
}

/// Inbound side of one locality on a [`ChannelNetwork`]
#[derive(Debug)]
pub struct Mailbox {
    locality: LocalityId,
    receiver: mpsc::UnboundedReceiver<Bytes>,
}

impl Mailbox {
    pub fn locality(&self) -> LocalityId {
        self.locality
    }

    /// Next raw parcel; `None` once the locality left the network
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }
}

/// Feed every parcel arriving in `mailbox` to `locality` until the mailbox
/// closes. Returns the number of parcels delivered.
pub async fn pump(mut mailbox: Mailbox, locality: Locality) -> u64 {
    let mut delivered = 0u64;
    while let Some(bytes) = mailbox.recv().await {
        delivered += 1;
        if let Err(err) = locality.on_parcel_received(&bytes) {
            debug!(locality = %mailbox.locality, error = %err, "inbound parcel not dispatched");
        }
    }
    debug!(locality = %mailbox.locality, delivered, "mailbox closed");
    delivered
}
