//! Command line interface.
//!
//! Flags override values from the optional TOML file, which override defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{read_config, validate_config, ConfigError, FrontendConfig};

#[derive(Debug, Parser)]
#[command(name = "pool-frontend", version)]
#[command(about = "Front-end that balances requests over a DNS-discovered backend pool", long_about = None)]
pub struct Cli {
    /// Backend pool name to resolve, as host:port
    #[arg(long, value_name = "HOST:PORT", env = "POOL_FRONTEND_CONNECT")]
    pub connect: Option<String>,

    /// Number of worker loops sharing the pool
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Inbound listen address
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seconds between backend re-resolutions
    #[arg(long, value_name = "SECS")]
    pub refresh_interval_secs: Option<u64>,

    /// Base backoff between retry rounds, in milliseconds
    #[arg(long, value_name = "MS")]
    pub backoff_ms: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long, value_name = "ADDR")]
    pub metrics_address: Option<String>,

    /// Inbound handler as module:callable (frontend:forward, demo:echo)
    #[arg(value_name = "APP")]
    pub app: Option<String>,
}

impl Cli {
    /// Apply command line overrides on top of `config`.
    pub fn apply(self, mut config: FrontendConfig) -> FrontendConfig {
        if let Some(connect) = self.connect {
            config.backend.connect = connect;
        }
        if let Some(workers) = self.workers {
            config.workers.count = workers;
        }
        if let Some(bind) = self.bind {
            config.listener.bind_address = bind;
        }
        if let Some(secs) = self.refresh_interval_secs {
            config.backend.refresh_interval_secs = secs;
        }
        if let Some(ms) = self.backoff_ms {
            config.retries.backoff_ms = ms;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_address = Some(addr);
        }
        if let Some(app) = self.app {
            config.app.reference = app;
        }
        config
    }

    /// Merge the config file (if any) with these flags and validate the result.
    pub fn into_config(self) -> Result<FrontendConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => read_config(path)?,
            None => FrontendConfig::default(),
        };
        let config = self.apply(base);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
