//! Core request/response types for wirecall.
//!
//! This crate provides shared types used by the `wirecall` client and by
//! anyone writing their own transport or body encoder against it.
//!
//! ## Modules
//!
//! - [`status`]: HTTP status classification into named error cases
//! - [`encoding`]: The body encoder contract and the stock encoders

mod encoding;
mod status;

pub use encoding::*;
pub use status::*;
