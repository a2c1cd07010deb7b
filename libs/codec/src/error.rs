//! Parcel-level errors
//!
//! Every decode failure carries enough context to tell a truncated read from
//! corruption or a version mismatch. At the dispatch boundary all of them
//! collapse into [`RuntimeError::MalformedParcel`].

use thiserror::Error;
use types::RuntimeError;

/// Parcel encoding/decoding errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParcelError {
    /// Buffer is too small to contain the expected structure
    #[error("Parcel too small: need {need} bytes, got {got} (context: {context})")]
    TooSmall {
        need: usize,
        got: usize,
        context: String,
    },

    /// Magic number validation failed
    #[error("Invalid magic number: expected {expected:#010x}, got {actual:#010x} (indicates: {diagnosis})")]
    InvalidMagic {
        expected: u32,
        actual: u32,
        diagnosis: String,
    },

    /// Version is not supported by this decoder
    #[error("Unsupported parcel version {version}: supported version is {supported}")]
    UnsupportedVersion { version: u8, supported: u8 },

    /// Header carries flag bits this version does not understand
    #[error("Unknown parcel flags {flags:#04x}")]
    UnknownFlags { flags: u8 },

    /// Checksum validation failed - indicates corruption
    #[error("Checksum mismatch: expected {expected:#010x}, calculated {calculated:#010x} (parcel: {parcel_size} bytes)")]
    ChecksumMismatch {
        expected: u32,
        calculated: u32,
        parcel_size: usize,
    },

    /// Declared payload size does not match the bytes present
    #[error("Payload length mismatch: header declares {declared} bytes, buffer holds {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Payload exceeds the configured limit
    #[error("Payload too large: {size} bytes exceeds limit {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Destination or continuation identity is not a valid GID
    #[error("Invalid {field} identity in parcel header")]
    InvalidIdentity { field: &'static str },

    /// Argument bytes do not decode as the expected type
    #[error("Cannot decode {type_name}: {message}")]
    ArgumentDecode { type_name: String, message: String },

    /// Value could not be encoded
    #[error("Cannot encode {type_name}: {message}")]
    ArgumentEncode { type_name: String, message: String },
}

impl ParcelError {
    /// Create TooSmall error with diagnostic context
    pub fn too_small(need: usize, got: usize, context: impl Into<String>) -> Self {
        Self::TooSmall {
            need,
            got,
            context: context.into(),
        }
    }

    /// Create InvalidMagic error, guessing at the cause
    pub fn invalid_magic(expected: u32, actual: u32) -> Self {
        let diagnosis = match actual {
            0x0000_0000 => "uninitialized buffer",
            0xFFFF_FFFF => "corrupted buffer",
            _ if actual.swap_bytes() == expected => "byte order (endianness) mismatch",
            _ => "data corruption or foreign protocol",
        };

        Self::InvalidMagic {
            expected,
            actual,
            diagnosis: diagnosis.to_string(),
        }
    }

    /// Create ArgumentDecode error for type `T`
    pub fn decode<T: ?Sized>(message: impl std::fmt::Display) -> Self {
        Self::ArgumentDecode {
            type_name: std::any::type_name::<T>().to_string(),
            message: message.to_string(),
        }
    }

    /// Create ArgumentEncode error for type `T`
    pub fn encode<T: ?Sized>(message: impl std::fmt::Display) -> Self {
        Self::ArgumentEncode {
            type_name: std::any::type_name::<T>().to_string(),
            message: message.to_string(),
        }
    }
}

impl From<ParcelError> for RuntimeError {
    fn from(err: ParcelError) -> Self {
        match err {
            ParcelError::ArgumentEncode { .. } => RuntimeError::serialization(err),
            other => RuntimeError::malformed(other.to_string()),
        }
    }
}

/// Result type for codec operations
pub type ParcelResult<T> = std::result::Result<T, ParcelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_diagnosis() {
        let err = ParcelError::invalid_magic(0x5052_434C, 0x4C43_5250);
        assert!(err.to_string().contains("endianness"));

        let err = ParcelError::invalid_magic(0x5052_434C, 0);
        assert!(err.to_string().contains("uninitialized"));
    }

    #[test]
    fn test_maps_to_malformed_parcel() {
        let err: RuntimeError = ParcelError::too_small(56, 3, "header").into();
        assert!(matches!(err, RuntimeError::MalformedParcel { .. }));

        let err: RuntimeError = ParcelError::encode::<f64>("boom").into();
        assert!(matches!(err, RuntimeError::Serialization { .. }));
    }
}
