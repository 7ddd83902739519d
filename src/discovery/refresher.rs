//! Periodic re-resolution of the backend pool.
//!
//! # Responsibilities
//! - Resolve the logical backend name on a fixed interval
//! - Feed successful results into the pool
//! - Keep the last known addresses when resolution fails or comes back empty

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};

use crate::discovery::resolver::{ResolutionError, Resolve};
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::{pool::ProvisionReport, AddressPool, AddressRecord};
use crate::observability::metrics;

/// Default time between refresh ticks.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Background task keeping an [`AddressPool`] in sync with discovery.
pub struct Refresher {
    name: AddressRecord,
    resolver: Arc<dyn Resolve>,
    pool: AddressPool,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        name: AddressRecord,
        resolver: Arc<dyn Resolve>,
        pool: AddressPool,
        interval: Duration,
    ) -> Self {
        Self {
            name,
            resolver,
            pool,
            interval,
        }
    }

    /// Resolve once and provision the pool with the result.
    ///
    /// On error, or when the name resolves to nothing, the pool is left as is.
    pub async fn refresh_once(&self) -> Result<ProvisionReport, ResolutionError> {
        let resolved = match self.resolver.resolve(&self.name).await {
            Ok(addresses) if addresses.is_empty() => Err(ResolutionError::Empty {
                name: self.name.clone(),
            }),
            other => other,
        };

        let addresses = match resolved {
            Ok(addresses) => addresses,
            Err(e) => {
                tracing::warn!(
                    name = %self.name,
                    error = %e,
                    known = self.pool.len(),
                    "Backend resolution failed, keeping last known addresses"
                );
                metrics::record_resolution_failure();
                return Err(e);
            }
        };

        let report = self.pool.provision(addresses);
        let snapshot = self.pool.snapshot();
        if report.is_unchanged() {
            tracing::trace!(name = %self.name, total = snapshot.total, "Backend pool unchanged");
        } else {
            tracing::info!(
                name = %self.name,
                added = report.added,
                removed = report.removed,
                retired = report.retired,
                restored = report.restored,
                total = snapshot.total,
                "Backend pool updated"
            );
        }
        metrics::record_pool(&snapshot);

        Ok(report)
    }

    /// Refresh every interval until shutdown.
    ///
    /// The first tick happens one interval after start; callers prime the
    /// pool with [`Refresher::refresh_once`]. A tick that is already running
    /// is allowed to finish before shutdown is observed.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        tracing::info!(
            name = %self.name,
            interval = ?self.interval,
            "Refresher starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("Refresher received shutdown signal, exiting loop");
                    break;
                }
            }

            let _ = self.refresh_once().await;
        }
    }
}
