//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the front-end.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the front-end.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FrontendConfig {
    /// Inbound listener configuration.
    pub listener: ListenerConfig,

    /// Backend pool discovery.
    pub backend: BackendConfig,

    /// Worker loop settings.
    pub workers: WorkerConfig,

    /// Retry backoff settings.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// TCP keep-alive applied to backend connections.
    pub keepalive: KeepaliveConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Inbound handler reference (`module:callable`).
    pub app: AppConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
        }
    }
}

/// Backend pool discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Logical backend pool name as `host:port`, resolved on every refresh.
    pub connect: String,

    /// Seconds between pool refreshes.
    pub refresh_interval_secs: u64,
}

impl BackendConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            connect: String::new(),
            refresh_interval_secs: 5,
        }
    }
}

/// Worker loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent worker loops.
    pub count: usize,

    /// Maximum number of work units waiting for a worker.
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 1,
            queue_depth: 1024,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Fixed delay between retry rounds in milliseconds.
    pub backoff_ms: u64,

    /// Random jitter added to each delay, as a fraction of `backoff_ms`.
    pub jitter_ratio: f64,

    /// Retry rounds per work unit before it is reported as failed.
    /// Every known address is tried at most once per round.
    pub max_rounds: u32,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff_ms: 2000,
            jitter_ratio: 0.1,
            max_rounds: 3,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Upper bound for one forwarded request/response exchange in seconds.
    pub exchange_secs: u64,

    /// Total inbound request timeout in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn exchange(&self) -> Duration {
        Duration::from_secs(self.exchange_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            exchange_secs: 30,
            request_secs: 60,
        }
    }
}

/// TCP keep-alive probing for backend connections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Idle time before the first probe, in seconds.
    pub idle_secs: u64,

    /// Interval between probes, in seconds.
    pub interval_secs: u64,

    /// Unanswered probes before the connection is dropped.
    pub probes: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            idle_secs: 1,
            interval_secs: 2,
            probes: 3,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus endpoint bind address; metrics are disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

/// Inbound handler selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// `module:callable` reference to a registered handler.
    pub reference: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reference: "demo:echo".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = FrontendConfig::default();
        assert_eq!(config.workers.count, 1);
        assert_eq!(config.backend.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.retries.backoff(), Duration::from_secs(2));
        assert_eq!(config.keepalive.idle_secs, 1);
        assert_eq!(config.keepalive.interval_secs, 2);
        assert_eq!(config.keepalive.probes, 3);
        assert_eq!(config.app.reference, "demo:echo");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: FrontendConfig = toml::from_str(
            r#"
            [backend]
            connect = "workers.internal:9000"

            [workers]
            count = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.connect, "workers.internal:9000");
        assert_eq!(config.backend.refresh_interval_secs, 5);
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.workers.queue_depth, 1024);
        assert_eq!(config.listener.bind_address, "127.0.0.1:8000");
    }
}
