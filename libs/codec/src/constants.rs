//! # Parcel Wire Constants
//!
//! Values that define the parcel wire format. They must stay identical on
//! every locality of a deployment, so changing any of them is a protocol
//! version bump.
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────┐
//! │ ParcelHeader (56 bytes)  │ Argument payload (variable)  │
//! └──────────────────────────┴──────────────────────────────┘
//! ```

/// Protocol identification, first four bytes of every parcel ("PRCL")
pub const PARCEL_MAGIC: u32 = 0x5052_434C;

/// Current parcel format version
pub const PARCEL_VERSION: u8 = 1;

/// Size of the fixed parcel header in bytes
pub const PARCEL_HEADER_SIZE: usize = 56;

/// Byte offset of the checksum field inside the header
pub const CHECKSUM_OFFSET: usize = 52;

/// Header flag: the parcel carries a continuation GID
pub const FLAG_HAS_CONTINUATION: u8 = 0x01;

/// Header flag: the parcel was already forwarded once by a locality that
/// no longer hosted its destination
pub const FLAG_FORWARDED: u8 = 0x02;

/// All flag bits understood by this version
pub const KNOWN_FLAGS: u8 = FLAG_HAS_CONTINUATION | FLAG_FORWARDED;

/// Default upper bound for an argument payload (16 MiB)
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;
