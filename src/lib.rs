//! Resource-balanced connection front-end.
//!
//! Accepts inbound HTTP requests and forwards each one over a fresh TCP
//! connection to one address of a DNS-discovered backend pool.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod worker;

pub use config::schema::FrontendConfig;
pub use http::FrontEndServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{AddressPool, AddressRecord, Lease, PoolExhausted};
