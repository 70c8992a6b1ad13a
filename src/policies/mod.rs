//! Retry policies for remote calls made inside a cycle.
//!
//! - [`RetryPolicy`] attempt budget around one call
//! - [`BackoffPolicy`] how the delay between attempts grows
//! - [`JitterPolicy`] randomization of that delay

mod backoff;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
