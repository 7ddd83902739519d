//! Backend discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (refresher.rs)
//!     → resolver.rs (logical name → addresses)
//!     → AddressPool::provision
//!
//! Resolution failure or empty result:
//!     → log, keep previous addresses, retry next tick
//! ```
//!
//! # Design Decisions
//! - Stale-but-serving beats an empty pool
//! - The refresher never touches leases; the pool handles retirement

pub mod refresher;
pub mod resolver;

pub use refresher::{Refresher, DEFAULT_REFRESH_INTERVAL};
pub use resolver::{DnsResolver, ResolutionError, Resolve, StaticResolver};
