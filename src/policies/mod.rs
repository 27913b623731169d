//! Retry policies for channel initialization.
//!
//! - [`BackoffPolicy`] how long to wait between `on_init` attempts (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization applied on top of the computed delay
//!
//! ```text
//! BusConfig { init_attempts, init_backoff: BackoffPolicy }
//!      └─► core::init::init_channel uses init_backoff.delay_for(attempt)
//!          between retryable failures
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
