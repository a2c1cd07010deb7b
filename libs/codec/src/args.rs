//! Argument and result codec
//!
//! Actions carry their arguments and results as self-describing byte payloads.
//! Encoding is bincode with fixed-width little-endian integers and trailing
//! bytes rejected, so a payload encoded for one type does not silently decode
//! as a shorter one.

use crate::error::{ParcelError, ParcelResult};
use bincode::Options;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Encode a value into a payload
pub fn encode<T: Serialize + ?Sized>(value: &T) -> ParcelResult<Bytes> {
    options()
        .serialize(value)
        .map(Bytes::from)
        .map_err(ParcelError::encode::<T>)
}

/// Decode a payload as `T`; fails on truncation, type mismatch or leftovers
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> ParcelResult<T> {
    options()
        .deserialize(payload)
        .map_err(ParcelError::decode::<T>)
}
