//! Backend address value.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

/// A single backend address as `(host, port)`.
///
/// Immutable once built; equality and hashing are by value so the same
/// address resolved twice maps to the same pool entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressRecord {
    host: String,
    port: u16,
}

impl AddressRecord {
    /// Create a new address record.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl From<SocketAddr> for AddressRecord {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            // IPv6 literal
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Error returned when a `host:port` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("missing port in address '{0}'")]
    MissingPort(String),

    #[error("invalid port in address '{0}'")]
    InvalidPort(String),

    #[error("empty host in address '{0}'")]
    EmptyHost(String),
}

impl FromStr for AddressRecord {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressParseError::MissingPort(s.to_string()))?;

        let port: u16 = port
            .parse()
            .map_err(|_| AddressParseError::InvalidPort(s.to_string()))?;

        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(AddressParseError::EmptyHost(s.to_string()));
        }

        Ok(Self::new(host, port))
    }
}
