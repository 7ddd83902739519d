//! Structured logging.
//!
//! Uses the tracing crate for structured events. `RUST_LOG` takes precedence
//! over the configured level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directives for a plain level such as `info`.
pub fn default_directives(level: &str) -> String {
    format!("pool_frontend={level},tower_http={level},warn")
}

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_scope_crate_level() {
        assert_eq!(
            default_directives("debug"),
            "pool_frontend=debug,tower_http=debug,warn"
        );
    }
}
