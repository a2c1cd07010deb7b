//! # Identifier System - Global Identities + Typed ID Wrappers
//!
//! Two families of identifiers are used throughout the runtime:
//!
//! ### 1. Global identities ([`Gid`])
//! - Name one component instance (or one outstanding continuation) across
//!   every locality of the deployment
//! - Fixed-width pair: `msb` carries the allocating locality prefix, `lsb` a
//!   per-locality sequence number
//! - Comparable and hashable; equality means "same instance" no matter where
//!   the instance currently lives
//! - The home locality is derivable from the value itself, which is how reply
//!   parcels find their way back without a registry lookup
//!
//! ### 2. Typed simple IDs
//! - Zero-cost `#[repr(transparent)]` wrappers around `u64`
//! - Compile-time separation of task ids, action ids and local handles
//!
//! ```rust
//! use types::{Gid, LocalityId, TaskId};
//!
//! let gid = Gid::new(LocalityId::new(3), 42);
//! assert_eq!(gid.home_locality(), LocalityId::new(3));
//! assert_eq!(gid.sequence(), 42);
//!
//! let task = TaskId::new(7);
//! assert_eq!(task.inner(), 7);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bits of [`Gid::msb`] reserved for the locality prefix.
const LOCALITY_SHIFT: u32 = 32;

/// Locality prefix bit marking a GID as valid (distinguishes locality 0 from
/// the invalid all-zero GID).
const VALID_BIT: u64 = 1;

/// Define a zero-cost typed `u64` identifier.
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create a new typed ID
            #[inline(always)]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Extract the inner u64 value
            #[inline(always)]
            pub const fn inner(&self) -> u64 {
                self.0
            }

            /// Generate next sequential ID
            #[inline(always)]
            pub fn next(&self) -> Self {
                Self(self.0.wrapping_add(1))
            }

            /// Check if this is a null/zero ID
            #[inline(always)]
            pub fn is_null(&self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u64> for $name {
            #[inline(always)]
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            #[inline(always)]
            fn from(id: $name) -> u64 {
                id.0
            }
        }

        // Serializes as raw u64
        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                u64::deserialize(deserializer).map(Self)
            }
        }
    };
}

define_typed_id!(
    /// Identifier of a lightweight task, unique within one scheduler
    TaskId
);

define_typed_id!(
    /// Stable identifier of a registered action
    ///
    /// Derived deterministically from the component type and method signature,
    /// so two localities registering the same action agree on its value.
    ActionId
);

define_typed_id!(
    /// Locality-private handle of a hosted component instance
    LocalHandle
);

impl ActionId {
    /// Reserved id carried by reply parcels (results flowing back to a
    /// continuation). Never produced by action-id derivation.
    pub const REPLY: ActionId = ActionId(u64::MAX);

    /// Whether this is the reserved reply id
    #[inline(always)]
    pub fn is_reply(&self) -> bool {
        *self == Self::REPLY
    }
}

/// One participating process/node of the deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct LocalityId(pub u32);

impl LocalityId {
    /// Create a locality id
    #[inline(always)]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Extract the inner value
    #[inline(always)]
    pub const fn inner(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LocalityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "locality#{}", self.0)
    }
}

impl From<u32> for LocalityId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Global identity of a component instance
///
/// Layout of `msb`: `[locality:32][reserved:31][valid:1]`. `lsb` is the
/// sequence number assigned by the allocating locality. The value never
/// changes when the instance migrates; only the registry entry does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Gid {
    msb: u64,
    lsb: u64,
}

impl Gid {
    /// The all-zero identity. Never returned by allocation.
    pub const INVALID: Gid = Gid { msb: 0, lsb: 0 };

    /// Build the GID allocated by `locality` with sequence number `sequence`
    #[inline]
    pub const fn new(locality: LocalityId, sequence: u64) -> Self {
        Self {
            msb: ((locality.0 as u64) << LOCALITY_SHIFT) | VALID_BIT,
            lsb: sequence,
        }
    }

    /// Rebuild a GID from its raw wire words
    #[inline]
    pub const fn from_raw(msb: u64, lsb: u64) -> Self {
        Self { msb, lsb }
    }

    /// Most significant word (locality prefix)
    #[inline(always)]
    pub const fn msb(&self) -> u64 {
        self.msb
    }

    /// Least significant word (sequence number)
    #[inline(always)]
    pub const fn lsb(&self) -> u64 {
        self.lsb
    }

    /// Locality that allocated this identity
    #[inline]
    pub const fn home_locality(&self) -> LocalityId {
        LocalityId((self.msb >> LOCALITY_SHIFT) as u32)
    }

    /// Per-locality sequence number
    #[inline(always)]
    pub const fn sequence(&self) -> u64 {
        self.lsb
    }

    /// False only for [`Gid::INVALID`] and other values lacking the valid bit
    #[inline]
    pub const fn is_valid(&self) -> bool {
        self.msb & VALID_BIT == VALID_BIT
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{:016x}, {:016x}}}", self.msb, self.lsb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_gid_home_locality_roundtrip() {
        let gid = Gid::new(LocalityId::new(17), 99);
        assert_eq!(gid.home_locality(), LocalityId::new(17));
        assert_eq!(gid.sequence(), 99);
        assert!(gid.is_valid());

        let rebuilt = Gid::from_raw(gid.msb(), gid.lsb());
        assert_eq!(rebuilt, gid);
    }

    #[test]
    fn test_gid_locality_zero_is_valid() {
        let gid = Gid::new(LocalityId::new(0), 0);
        assert!(gid.is_valid());
        assert_ne!(gid, Gid::INVALID);
        assert!(!Gid::INVALID.is_valid());
    }

    #[test]
    fn test_gid_equality_and_hash() {
        let a = Gid::new(LocalityId::new(1), 5);
        let b = Gid::new(LocalityId::new(1), 5);
        let c = Gid::new(LocalityId::new(2), 5);

        let set: HashSet<Gid> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_gid_display() {
        let gid = Gid::new(LocalityId::new(1), 0x2a);
        assert_eq!(
            format!("{}", gid),
            "{0000000100000001, 000000000000002a}"
        );
    }

    #[test]
    fn test_typed_ids() {
        let task = TaskId::new(41);
        assert_eq!(task.next(), TaskId::new(42));
        assert_eq!(format!("{}", task), "TaskId(41)");
        assert!(TaskId::default().is_null());
        assert!(ActionId::REPLY.is_reply());
        assert!(!ActionId::new(3).is_reply());
    }

    #[test]
    fn test_ids_serialize_as_raw_values() {
        let json = serde_json::to_string(&LocalHandle::new(9)).unwrap();
        assert_eq!(json, "9");
        let json = serde_json::to_string(&LocalityId::new(4)).unwrap();
        assert_eq!(json, "4");
    }
}
