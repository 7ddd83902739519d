//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Worker loop step fails (pool exhausted, connect refused):
//!     → backoff.rs (fixed delay + jitter before the next round)
//!     → timeouts.rs (every backend call has a deadline)
//! ```
//!
//! # Design Decisions
//! - Retry policy lives in the worker loop, not in the connector
//! - Retries are bounded; callers get a failure response afterwards
//! - Jitter keeps workers from retrying in lockstep

pub mod backoff;
pub mod timeouts;

pub use backoff::Backoff;
pub use timeouts::{with_deadline, TimedOut};
