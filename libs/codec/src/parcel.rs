//! Parcel: an immutable invocation message
//!
//! A parcel names its target only by GID and action id and carries its
//! arguments as an encoded payload, so it means the same thing on whichever
//! locality decodes it.

use crate::args;
use crate::error::ParcelResult;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use types::{ActionId, Gid, RuntimeError};

/// Wire message describing one action invocation (or one reply)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parcel {
    destination: Gid,
    action_id: ActionId,
    payload: Bytes,
    continuation: Option<Gid>,
    forwarded: bool,
}

/// Body of a reply parcel: the encoded result, or the failure
pub type ReplyBody = Result<Vec<u8>, RuntimeError>;

impl Parcel {
    /// Build a parcel from already-encoded arguments
    pub fn new(
        destination: Gid,
        action_id: ActionId,
        payload: Bytes,
        continuation: Option<Gid>,
    ) -> Self {
        Self {
            destination,
            action_id,
            payload,
            continuation,
            forwarded: false,
        }
    }

    /// Build a parcel, encoding `args`
    pub fn build<A: Serialize + ?Sized>(
        destination: Gid,
        action_id: ActionId,
        args: &A,
        continuation: Option<Gid>,
    ) -> ParcelResult<Self> {
        let payload = args::encode(args)?;
        Ok(Self::new(destination, action_id, payload, continuation))
    }

    /// Build the reply parcel that satisfies `continuation` with `body`
    pub fn reply(continuation: Gid, body: &ReplyBody) -> ParcelResult<Self> {
        Self::build(continuation, ActionId::REPLY, body, None)
    }

    pub fn destination(&self) -> Gid {
        self.destination
    }

    pub fn action_id(&self) -> ActionId {
        self.action_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn continuation(&self) -> Option<Gid> {
        self.continuation
    }

    /// Mark the parcel as relayed by a locality that no longer hosts its
    /// destination. A forwarded parcel is never forwarded again.
    pub fn into_forwarded(mut self) -> Self {
        self.forwarded = true;
        self
    }

    pub fn is_forwarded(&self) -> bool {
        self.forwarded
    }

    /// Whether this parcel carries a result back to a continuation
    pub fn is_reply(&self) -> bool {
        self.action_id.is_reply()
    }

    /// Decode the reply body of a reply parcel
    pub fn reply_body(&self) -> ParcelResult<ReplyBody> {
        args::decode(&self.payload)
    }
}

impl fmt::Display for Parcel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parcel(to={}, action={}, {} bytes",
            self.destination,
            self.action_id,
            self.payload.len()
        )?;
        if let Some(cont) = self.continuation {
            write!(f, ", cont={}", cont)?;
        }
        if self.forwarded {
            write!(f, ", forwarded")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::LocalityId;

    #[test]
    fn test_build_encodes_arguments() {
        let dest = Gid::new(LocalityId::new(1), 3);
        let parcel = Parcel::build(dest, ActionId::new(9), &3.5f64, None).unwrap();

        assert_eq!(parcel.destination(), dest);
        assert_eq!(parcel.payload().len(), 8);
        assert!(!parcel.is_reply());
        let back: f64 = args::decode(parcel.payload()).unwrap();
        assert_eq!(back, 3.5);
    }

    #[test]
    fn test_reply_body_roundtrip() {
        let cont = Gid::new(LocalityId::new(0), 8);
        let failure: ReplyBody = Err(RuntimeError::UnknownIdentity { gid: cont });
        let parcel = Parcel::reply(cont, &failure).unwrap();

        assert!(parcel.is_reply());
        assert_eq!(parcel.continuation(), None);
        assert_eq!(parcel.reply_body().unwrap(), failure);
    }

    #[test]
    fn test_forwarding_marks_once() {
        let parcel = Parcel::build(Gid::new(LocalityId::new(2), 4), ActionId::new(9), &1u8, None)
            .unwrap();
        assert!(!parcel.is_forwarded());

        let relayed = parcel.clone().into_forwarded();
        assert!(relayed.is_forwarded());
        assert_ne!(relayed, parcel);
        assert!(relayed.to_string().ends_with(", forwarded)"));
    }
}
