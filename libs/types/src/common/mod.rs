//! Identifiers and error types shared by every runtime crate

pub mod errors;
pub mod identifiers;
