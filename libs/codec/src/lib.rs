//! # Parcel Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the runtime's wire contract:
//! - Parcel structure and the fixed 56-byte header
//! - Parcel serialization with CRC32 sealing
//! - Validating parcel deserialization (`MalformedParcel` at the dispatch layer)
//! - Argument/result payload codec shared by every registered action
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/dispatch → transport collaborator
//!     ↑           ↓             ↓
//! Gid, ActionId  Parcel     Applier / inbound pipeline
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Any transport (sockets, RDMA); parcels are handed over as bytes
//! - Identity resolution or scheduling

pub mod args;
pub mod builder;
pub mod constants;
pub mod error;
pub mod header;
pub mod parcel;
pub mod parser;

pub use builder::{serialize, serialize_with_limit};
pub use constants::*;
pub use error::{ParcelError, ParcelResult};
pub use header::ParcelHeader;
pub use parcel::{Parcel, ReplyBody};
pub use parser::{deserialize, deserialize_with, parse_header, DecodeOptions};
