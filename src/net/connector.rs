//! Outbound connections to leased backend addresses.
//!
//! # Responsibilities
//! - Open a TCP stream to the leased address within the connect timeout
//! - Enable TCP keep-alive so dead backends are noticed off the request path
//! - Release the lease right away when the connect fails
//!
//! The connector never retries; the worker loop owns retry and backoff.

use std::io;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::{FrontendConfig, KeepaliveConfig};
use crate::load_balancer::{AddressRecord, Lease};
use crate::net::connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
use crate::observability::metrics;
use crate::resilience::{with_deadline, TimedOut};

/// TCP connect to a backend failed. The lease has already been released.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect to {address} failed: {source}")]
    Io {
        address: AddressRecord,
        #[source]
        source: io::Error,
    },

    #[error("connect to {address} timed out after {after:?}")]
    Timeout {
        address: AddressRecord,
        after: Duration,
    },
}

impl ConnectError {
    pub fn address(&self) -> &AddressRecord {
        match self {
            ConnectError::Io { address, .. } | ConnectError::Timeout { address, .. } => address,
        }
    }
}

/// Keep-alive probing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveSettings {
    pub idle: Duration,
    pub interval: Duration,
    pub probes: u32,
}

impl From<&KeepaliveConfig> for KeepaliveSettings {
    fn from(config: &KeepaliveConfig) -> Self {
        Self {
            idle: Duration::from_secs(config.idle_secs),
            interval: Duration::from_secs(config.interval_secs),
            probes: config.probes,
        }
    }
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self::from(&KeepaliveConfig::default())
    }
}

/// An open backend stream together with the lease for its address.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    lease: Lease,
    guard: ConnectionGuard,
}

impl Connection {
    pub fn address(&self) -> &AddressRecord {
        self.lease.address()
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_parts(self) -> (TcpStream, Lease, ConnectionGuard) {
        (self.stream, self.lease, self.guard)
    }
}

/// Opens keep-alive TCP connections to leased addresses.
#[derive(Debug, Clone)]
pub struct Connector {
    connect_timeout: Duration,
    keepalive: KeepaliveSettings,
    tracker: ConnectionTracker,
}

impl Connector {
    pub fn new(connect_timeout: Duration, keepalive: KeepaliveSettings) -> Self {
        Self {
            connect_timeout,
            keepalive,
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn from_config(config: &FrontendConfig) -> Self {
        Self::new(
            config.timeouts.connect(),
            KeepaliveSettings::from(&config.keepalive),
        )
    }

    /// Tracker counting connections this connector opened and that are still open.
    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Connect to the leased address.
    ///
    /// On failure the lease is dropped, so the address is available to other
    /// workers again before this call returns.
    pub async fn connect(&self, lease: Lease) -> Result<Connection, ConnectError> {
        let address = lease.address().clone();

        let attempt = with_deadline(
            self.connect_timeout,
            TcpStream::connect((address.host(), address.port())),
        )
        .await;

        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                drop(lease);
                tracing::warn!(backend = %address, error = %source, "Backend connect failed");
                metrics::record_connect_failure(&address.to_string());
                return Err(ConnectError::Io { address, source });
            }
            Err(TimedOut(after)) => {
                drop(lease);
                tracing::warn!(backend = %address, timeout = ?after, "Backend connect timed out");
                metrics::record_connect_failure(&address.to_string());
                return Err(ConnectError::Timeout { address, after });
            }
        };

        if let Err(e) = self.configure(&stream) {
            tracing::warn!(backend = %address, error = %e, "Failed to set backend socket options");
        }

        let guard = self.tracker.track();
        tracing::debug!(backend = %address, connection_id = %guard.id(), "Backend connected");
        Ok(Connection {
            stream,
            lease,
            guard,
        })
    }

    fn configure(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(true)?;
        SockRef::from(stream).set_tcp_keepalive(&self.keepalive_params())
    }

    fn keepalive_params(&self) -> TcpKeepalive {
        let keepalive = TcpKeepalive::new().with_time(self.keepalive.idle);

        #[cfg(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "freebsd"
        ))]
        let keepalive = keepalive
            .with_interval(self.keepalive.interval)
            .with_retries(self.keepalive.probes);

        keepalive
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::from_config(&FrontendConfig::default())
    }
}
