//! Name resolution for the backend pool.
//!
//! # Responsibilities
//! - Map a logical backend name (`host:port`) to concrete addresses
//! - Keep the lookup mechanism pluggable (DNS, static lists, test fakes)

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

use crate::load_balancer::AddressRecord;

/// Discovery failed; the caller keeps its previous address set.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The lookup itself failed (NXDOMAIN, resolver unreachable, ...).
    #[error("failed to resolve {name}: {source}")]
    Lookup {
        name: AddressRecord,
        #[source]
        source: io::Error,
    },

    /// The lookup succeeded but returned nothing.
    #[error("{name} resolved to no addresses")]
    Empty { name: AddressRecord },
}

/// Pluggable resolver from a logical name to a set of backend addresses.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, name: &AddressRecord) -> Result<Vec<AddressRecord>, ResolutionError>;
}

/// Resolver backed by the host's standard resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl DnsResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    async fn resolve(&self, name: &AddressRecord) -> Result<Vec<AddressRecord>, ResolutionError> {
        let resolved = tokio::net::lookup_host((name.host(), name.port()))
            .await
            .map_err(|source| ResolutionError::Lookup {
                name: name.clone(),
                source,
            })?;

        let mut addresses: Vec<AddressRecord> = resolved.map(AddressRecord::from).collect();
        // DNS servers often rotate record order; keep pool insertion stable.
        addresses.sort();
        addresses.dedup();
        Ok(addresses)
    }
}

/// Resolver returning a fixed, replaceable address list.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addresses: Arc<Mutex<Vec<AddressRecord>>>,
}

impl StaticResolver {
    pub fn new(addresses: Vec<AddressRecord>) -> Self {
        Self {
            addresses: Arc::new(Mutex::new(addresses)),
        }
    }

    /// Replace the list returned by future resolutions.
    pub fn set(&self, addresses: Vec<AddressRecord>) {
        *self.addresses.lock().unwrap_or_else(PoisonError::into_inner) = addresses;
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve(&self, _name: &AddressRecord) -> Result<Vec<AddressRecord>, ResolutionError> {
        Ok(self
            .addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
