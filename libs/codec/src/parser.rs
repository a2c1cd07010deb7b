//! # Parcel Parser
//!
//! Validates and decodes serialized parcels. Checks run cheapest first:
//! size, magic, version, flags, length, checksum, identities. Any failure
//! rejects the whole parcel; nothing is partially delivered.

use crate::constants::{
    DEFAULT_MAX_PAYLOAD_BYTES, KNOWN_FLAGS, PARCEL_HEADER_SIZE, PARCEL_MAGIC, PARCEL_VERSION,
};
use crate::error::{ParcelError, ParcelResult};
use crate::header::ParcelHeader;
use crate::parcel::Parcel;
use bytes::Bytes;
use zerocopy::FromBytes;

/// Decoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub verify_checksum: bool,
    pub max_payload_bytes: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Parse and validate the fixed header (no checksum check)
pub fn parse_header(data: &[u8]) -> ParcelResult<ParcelHeader> {
    let header = ParcelHeader::read_from_prefix(data).ok_or_else(|| {
        ParcelError::too_small(PARCEL_HEADER_SIZE, data.len(), "ParcelHeader parsing")
    })?;

    if header.magic.get() != PARCEL_MAGIC {
        return Err(ParcelError::invalid_magic(PARCEL_MAGIC, header.magic.get()));
    }

    if header.version != PARCEL_VERSION {
        return Err(ParcelError::UnsupportedVersion {
            version: header.version,
            supported: PARCEL_VERSION,
        });
    }

    if header.flags & !KNOWN_FLAGS != 0 {
        return Err(ParcelError::UnknownFlags {
            flags: header.flags,
        });
    }

    Ok(header)
}

/// Deserialize a parcel with default options
pub fn deserialize(data: &[u8]) -> ParcelResult<Parcel> {
    deserialize_with(data, &DecodeOptions::default())
}

/// Deserialize a parcel
pub fn deserialize_with(data: &[u8], options: &DecodeOptions) -> ParcelResult<Parcel> {
    let header = parse_header(data)?;

    let declared = header.payload_size.get() as usize;
    if declared > options.max_payload_bytes {
        return Err(ParcelError::PayloadTooLarge {
            size: declared,
            limit: options.max_payload_bytes,
        });
    }

    let actual = data.len() - PARCEL_HEADER_SIZE;
    if declared != actual {
        return Err(ParcelError::LengthMismatch { declared, actual });
    }

    if options.verify_checksum && !header.verify_checksum(data) {
        return Err(ParcelError::ChecksumMismatch {
            expected: header.checksum.get(),
            calculated: ParcelHeader::compute_checksum(data),
            parcel_size: data.len(),
        });
    }

    let destination = header.destination();
    if !destination.is_valid() {
        return Err(ParcelError::InvalidIdentity {
            field: "destination",
        });
    }

    let continuation = header.continuation();
    if matches!(continuation, Some(gid) if !gid.is_valid()) {
        return Err(ParcelError::InvalidIdentity {
            field: "continuation",
        });
    }

    let payload = Bytes::copy_from_slice(&data[PARCEL_HEADER_SIZE..]);
    let parcel = Parcel::new(destination, header.action_id(), payload, continuation);
    Ok(if header.is_forwarded() {
        parcel.into_forwarded()
    } else {
        parcel
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::serialize;
    use crate::constants::{CHECKSUM_OFFSET, FLAG_FORWARDED};
    use types::{ActionId, Gid, LocalityId};

    fn sample() -> Parcel {
        Parcel::build(
            Gid::new(LocalityId::new(1), 100),
            ActionId::new(0xfeed),
            &(3.5f64, "add".to_string()),
            Some(Gid::new(LocalityId::new(0), 7)),
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let parcel = sample();
        let bytes = serialize(&parcel).unwrap();
        assert_eq!(deserialize(&bytes).unwrap(), parcel);
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = serialize(&sample()).unwrap();
        assert!(matches!(
            deserialize(&bytes[..20]),
            Err(ParcelError::TooSmall { need: 56, got: 20, .. })
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let bytes = serialize(&sample()).unwrap();
        assert!(matches!(
            deserialize(&bytes[..bytes.len() - 3]),
            Err(ParcelError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = serialize(&sample()).unwrap().to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            deserialize(&bytes),
            Err(ParcelError::ChecksumMismatch { .. })
        ));

        let lenient = DecodeOptions {
            verify_checksum: false,
            ..DecodeOptions::default()
        };
        assert!(deserialize_with(&bytes, &lenient).is_ok());
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut bytes = serialize(&sample()).unwrap().to_vec();
        bytes[0] = 0;
        assert!(matches!(
            deserialize(&bytes),
            Err(ParcelError::InvalidMagic { .. })
        ));

        let mut bytes = serialize(&sample()).unwrap().to_vec();
        bytes[4] = PARCEL_VERSION + 1;
        assert!(matches!(
            deserialize(&bytes),
            Err(ParcelError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_unknown_flags_rejected() {
        let mut bytes = serialize(&sample()).unwrap().to_vec();
        bytes[5] |= 0x80;
        assert!(matches!(
            deserialize(&bytes),
            Err(ParcelError::UnknownFlags { .. })
        ));
    }

    #[test]
    fn test_forwarded_flag_survives_the_wire() {
        let bytes = serialize(&sample().into_forwarded()).unwrap();
        assert_ne!(bytes[5] & FLAG_FORWARDED, 0);
        assert!(deserialize(&bytes).unwrap().is_forwarded());

        let bytes = serialize(&sample()).unwrap();
        assert_eq!(bytes[5] & FLAG_FORWARDED, 0);
        assert!(!deserialize(&bytes).unwrap().is_forwarded());
    }

    #[test]
    fn test_invalid_destination_rejected() {
        let parcel = Parcel::new(Gid::INVALID, ActionId::new(1), Bytes::new(), None);
        let bytes = serialize(&parcel).unwrap();
        assert!(matches!(
            deserialize(&bytes),
            Err(ParcelError::InvalidIdentity { field: "destination" })
        ));
    }

    #[test]
    fn test_checksum_field_location() {
        let bytes = serialize(&sample()).unwrap();
        let header = parse_header(&bytes).unwrap();
        assert_eq!(
            &bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4],
            &header.checksum.get().to_le_bytes()
        );
    }
}
