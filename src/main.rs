//! pool-frontend
//!
//! A front-end that balances inbound requests over a backend pool.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    POOL FRONT-END                     │
//!                      │                                                       │
//!   Client Request     │  ┌─────────┐    ┌──────────┐    ┌──────────────────┐ │
//!   ───────────────────┼─▶│  http   │───▶│ dispatch │───▶│  worker loops    │ │
//!                      │  │ server  │    │  queue   │    │ acquire/connect/ │ │
//!                      │  └─────────┘    └──────────┘    │     forward      │ │
//!                      │                                 └────────┬─────────┘ │
//!                      │  ┌───────────┐  provision  ┌──────────┐  │ lease     │
//!   DNS ◀──────────────┼──│ refresher │────────────▶│  pool    │◀─┘           │
//!                      │  └───────────┘             └──────────┘              │
//!                      │                                  │                   │
//!   Client Response    │                                  ▼                   │
//!   ◀──────────────────┼──────────── one exchange per connection ─────────────┼──▶ Backend
//!                      └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use pool_frontend::cli::Cli;
use pool_frontend::lifecycle;
use pool_frontend::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pool-frontend: {}", e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        backend = %config.backend.connect,
        workers = config.workers.count,
        app = %config.app.reference,
        "pool-frontend starting"
    );

    if let Err(e) = lifecycle::run(config).await {
        tracing::error!(error = %e, "Fatal error");
        return Err(e.into());
    }
    Ok(())
}
