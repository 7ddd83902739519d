//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Refresher resolves backend name
//!     → pool.rs provision (merge address set, retire vanished addresses)
//!
//! Worker loop
//!     → pool.rs acquire
//!         → round_robin.rs (next available entry)
//!     → Lease (exclusive checkout)
//!     → dropped → released back to pool (or deleted if stale)
//! ```
//!
//! # Design Decisions
//! - The pool never judges liveness; connect failures are handled by callers
//! - Leases are move-only RAII handles
//! - Selection policy is pluggable, round-robin by default

pub mod address;
pub mod pool;
pub mod round_robin;

use std::fmt::Debug;

use crate::load_balancer::pool::PoolEntry;

pub use address::AddressRecord;
pub use pool::{AddressPool, Lease, PoolExhausted};

/// Chooses which available entry the next acquire gets.
pub trait Selector: Debug + Send {
    /// Return the index of an available entry, or `None` if there is none.
    fn select(&mut self, entries: &[PoolEntry]) -> Option<usize>;

    /// Called after the entry at `index` was removed from the list.
    fn removed(&mut self, index: usize);
}
