//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → apps.rs (selected inbound handler)
//!     → [worker loop acquires, connects] (worker/)
//!     → forwarder.rs (one HTTP/1.1 exchange per backend connection)
//!     → response.rs (strip hop-by-hop headers, failure bodies)
//!     → Send to client
//! ```

pub mod apps;
pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use apps::{App, AppRefError};
pub use forwarder::{Completion, Exchange, ForwardError, RequestForwarder};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::FrontEndServer;
