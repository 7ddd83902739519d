//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Lease (exclusive backend address)
//!     → connector.rs (TCP connect with timeout, keep-alive options)
//!     → connection.rs (connection ID, open connection count)
//!     → Hand off to the HTTP forwarder
//!
//! Connect failure:
//!     → lease released immediately
//!     → ConnectError returned to the worker loop
//! ```
//!
//! # Design Decisions
//! - Keep-alive probing detects dead backends independent of traffic
//! - No retries here; retry policy belongs to the worker loop

pub mod connection;
pub mod connector;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use connector::{ConnectError, Connection, Connector, KeepaliveSettings};
