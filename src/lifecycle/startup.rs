//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the inbound handler and backend name before binding
//! - Start the metrics exporter when configured
//! - Bind the listener and run the server until a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, FrontendConfig};
use crate::http::{AppRefError, FrontEndServer};
use crate::lifecycle::signals::spawn_signal_handler;
use crate::lifecycle::Shutdown;
use crate::load_balancer::address::AddressParseError;
use crate::observability::metrics;

/// Errors that stop the front-end from starting or keep it from running.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid app reference: {0}")]
    App(#[from] AppRefError),

    #[error("invalid backend name '{value}': {source}")]
    InvalidConnect {
        value: String,
        #[source]
        source: AddressParseError,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// Run the front-end with validated `config` until SIGINT or SIGTERM.
pub async fn run(config: FrontendConfig) -> Result<(), StartupError> {
    let server = FrontEndServer::new(config.clone())?;

    if let Some(address) = &config.observability.metrics_address {
        match address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    tracing::info!(
        address = %listener.local_addr()?,
        backend = %config.backend.connect,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    let result = server.run(listener, shutdown.subscribe()).await;
    signals.abort();
    result?;

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_app_fails_before_binding() {
        let mut config = FrontendConfig::default();
        config.backend.connect = "localhost:9000".into();
        config.app.reference = "nowhere:handler".into();

        let err = run(config).await.unwrap_err();
        assert!(matches!(err, StartupError::App(AppRefError::UnknownModule(_))));
    }

    #[tokio::test]
    async fn occupied_bind_address_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = FrontendConfig::default();
        config.backend.connect = "localhost:9000".into();
        config.listener.bind_address = taken.local_addr().unwrap().to_string();

        let err = run(config).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
