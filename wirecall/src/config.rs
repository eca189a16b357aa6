//! Configuration for sessions and requests.
//!
//! - [`Configuration`]: typed registry of tunables, copied per request scope
//! - [`keys`]: the built-in keys the pipeline reads
//! - [`RetryPolicy`]: retry eligibility, ceiling and delay strategy

pub mod keys;
mod registry;
mod retry;

pub use registry::{ConfigKey, Configuration};
pub use retry::{
    defaults, ExponentialBackoff, RetryDelay, RetryHandler, RetryPolicy, RetryResult,
};
