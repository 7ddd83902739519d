//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command line flags override file values
//!     → validation.rs (semantic checks)
//!     → FrontendConfig (validated, immutable)
//!     → handed to FrontEndServer at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use schema::{
    AppConfig, BackendConfig, FrontendConfig, KeepaliveConfig, ListenerConfig,
    ObservabilityConfig, RetryConfig, TimeoutConfig, WorkerConfig,
};
pub use validation::{validate_config, ValidationError};
