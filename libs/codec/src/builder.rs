//! # Parcel Serialization
//!
//! Writes a [`Parcel`] as header + payload and seals it with a CRC32
//! checksum. The payload is copied exactly once into the output buffer.
//!
//! ```text
//! Applier → [serialize] → bytes → Transport
//! ```

use crate::constants::{CHECKSUM_OFFSET, DEFAULT_MAX_PAYLOAD_BYTES, FLAG_FORWARDED};
use crate::error::{ParcelError, ParcelResult};
use crate::header::ParcelHeader;
use crate::parcel::Parcel;
use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::byteorder::U32;
use zerocopy::AsBytes;

/// Serialize a parcel with the default payload limit
pub fn serialize(parcel: &Parcel) -> ParcelResult<Bytes> {
    serialize_with_limit(parcel, DEFAULT_MAX_PAYLOAD_BYTES)
}

/// Serialize a parcel, rejecting payloads larger than `max_payload_bytes`
pub fn serialize_with_limit(parcel: &Parcel, max_payload_bytes: usize) -> ParcelResult<Bytes> {
    let payload = parcel.payload();
    if payload.len() > max_payload_bytes || payload.len() > u32::MAX as usize {
        return Err(ParcelError::PayloadTooLarge {
            size: payload.len(),
            limit: max_payload_bytes.min(u32::MAX as usize),
        });
    }

    let mut header = ParcelHeader::new(
        parcel.destination(),
        parcel.action_id(),
        parcel.continuation(),
    );
    if parcel.is_forwarded() {
        header.flags |= FLAG_FORWARDED;
    }
    header.payload_size = U32::new(payload.len() as u32);

    let mut buffer = BytesMut::with_capacity(ParcelHeader::SIZE + payload.len());
    buffer.put_slice(header.as_bytes());
    buffer.put_slice(payload);

    let checksum = ParcelHeader::compute_checksum(&buffer);
    buffer[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());

    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PARCEL_HEADER_SIZE, PARCEL_MAGIC};
    use types::{ActionId, Gid, LocalityId};

    #[test]
    fn test_serialized_layout() {
        let parcel = Parcel::build(
            Gid::new(LocalityId::new(1), 2),
            ActionId::new(3),
            &42u32,
            None,
        )
        .unwrap();
        let bytes = serialize(&parcel).unwrap();

        assert_eq!(bytes.len(), PARCEL_HEADER_SIZE + 4);
        assert_eq!(&bytes[0..4], &PARCEL_MAGIC.to_le_bytes());
        assert_eq!(&bytes[PARCEL_HEADER_SIZE..], &42u32.to_le_bytes());
    }

    #[test]
    fn test_payload_limit_enforced() {
        let parcel = Parcel::new(
            Gid::new(LocalityId::new(1), 2),
            ActionId::new(3),
            Bytes::from(vec![0u8; 128]),
            None,
        );
        assert!(matches!(
            serialize_with_limit(&parcel, 64),
            Err(ParcelError::PayloadTooLarge { size: 128, limit: 64 })
        ));
        assert!(serialize_with_limit(&parcel, 128).is_ok());
    }
}
