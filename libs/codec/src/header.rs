//! Parcel Header Implementation
//!
//! Fixed 56-byte header in front of every parcel. All multi-byte fields are
//! little-endian so a parcel decodes identically on any locality.

use crate::constants::{
    CHECKSUM_OFFSET, FLAG_FORWARDED, FLAG_HAS_CONTINUATION, PARCEL_HEADER_SIZE, PARCEL_MAGIC,
    PARCEL_VERSION,
};
use types::{ActionId, Gid};
use zerocopy::byteorder::{LittleEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Parcel Header (56 bytes)
///
/// ```text
/// bytes  0-3   magic            "PRCL"
/// byte   4     version
/// byte   5     flags            bit 0: continuation present
///                               bit 1: forwarded once
/// bytes  6-7   reserved
/// bytes  8-23  destination gid  (msb, lsb)
/// bytes 24-31  action id
/// bytes 32-47  continuation gid (msb, lsb), zero when absent
/// bytes 48-51  payload size
/// bytes 52-55  checksum         CRC32 of header (checksum zeroed) + payload
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct ParcelHeader {
    pub magic: U32<LittleEndian>,
    pub version: u8,
    pub flags: u8,
    pub reserved: U16<LittleEndian>,
    pub destination_msb: U64<LittleEndian>,
    pub destination_lsb: U64<LittleEndian>,
    pub action_id: U64<LittleEndian>,
    pub continuation_msb: U64<LittleEndian>,
    pub continuation_lsb: U64<LittleEndian>,
    pub payload_size: U32<LittleEndian>,
    pub checksum: U32<LittleEndian>,
}

impl ParcelHeader {
    /// Header size in bytes
    pub const SIZE: usize = PARCEL_HEADER_SIZE;

    /// Create a header; payload size and checksum are filled in when the
    /// parcel is serialized
    pub fn new(destination: Gid, action_id: ActionId, continuation: Option<Gid>) -> Self {
        let (flags, cont) = match continuation {
            Some(gid) => (FLAG_HAS_CONTINUATION, gid),
            None => (0, Gid::INVALID),
        };

        Self {
            magic: U32::new(PARCEL_MAGIC),
            version: PARCEL_VERSION,
            flags,
            reserved: U16::new(0),
            destination_msb: U64::new(destination.msb()),
            destination_lsb: U64::new(destination.lsb()),
            action_id: U64::new(action_id.inner()),
            continuation_msb: U64::new(cont.msb()),
            continuation_lsb: U64::new(cont.lsb()),
            payload_size: U32::new(0),
            checksum: U32::new(0),
        }
    }

    pub fn destination(&self) -> Gid {
        Gid::from_raw(self.destination_msb.get(), self.destination_lsb.get())
    }

    pub fn action_id(&self) -> ActionId {
        ActionId::new(self.action_id.get())
    }

    /// Continuation GID, if the continuation flag is set
    pub fn continuation(&self) -> Option<Gid> {
        if self.flags & FLAG_HAS_CONTINUATION != 0 {
            Some(Gid::from_raw(
                self.continuation_msb.get(),
                self.continuation_lsb.get(),
            ))
        } else {
            None
        }
    }

    pub fn is_forwarded(&self) -> bool {
        self.flags & FLAG_FORWARDED != 0
    }

    /// CRC32 over the full parcel with the checksum field skipped
    pub fn compute_checksum(full_parcel: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&full_parcel[..CHECKSUM_OFFSET]);
        hasher.update(&full_parcel[CHECKSUM_OFFSET + 4..]);
        hasher.finalize()
    }

    /// Verify the checksum against the full parcel
    pub fn verify_checksum(&self, full_parcel: &[u8]) -> bool {
        Self::compute_checksum(full_parcel) == self.checksum.get()
    }
}
