//! Worker loop: acquire → connect → forward, with bounded retry.
//!
//! # State Machine (per work unit)
//! ```text
//! Idle → Acquiring → Connecting → Forwarding → (Success | Failure) → Idle
//!            ↑            │
//!            └────────────┘  pool exhausted / connect failed
//! ```
//!
//! # Retry Rounds
//! Within a round every distinct address is tried at most once. A round ends
//! when the pool is exhausted or hands back an address already tried; the
//! worker then sleeps one backoff. After `max_rounds` rounds the unit fails.

use std::collections::HashSet;
use std::fmt;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
};
use thiserror::Error;
use tracing::Instrument;

use crate::config::FrontendConfig;
use crate::http::forwarder::{Exchange, ForwardError, RequestForwarder};
use crate::http::response::failure_response;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::{AddressPool, AddressRecord};
use crate::net::{ConnectError, Connector};
use crate::observability::metrics;
use crate::resilience::Backoff;
use crate::worker::dispatch::{WorkQueue, WorkUnit};

/// Where a worker is within one work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Acquiring,
    Connecting,
    Forwarding,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Acquiring => "acquiring",
            WorkerState::Connecting => "connecting",
            WorkerState::Forwarding => "forwarding",
        };
        f.write_str(name)
    }
}

/// Why a work unit was not forwarded.
#[derive(Debug, Error)]
pub enum WorkFailure {
    #[error("no backend address available after {rounds} rounds")]
    Exhausted { rounds: u32 },

    #[error("no backend reachable after {rounds} rounds, last error: {last}")]
    Unreachable { rounds: u32, last: ConnectError },

    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("front-end is shutting down")]
    ShuttingDown,
}

impl WorkFailure {
    pub fn status(&self) -> StatusCode {
        match self {
            WorkFailure::Exhausted { .. } | WorkFailure::ShuttingDown => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            WorkFailure::Unreachable { .. } | WorkFailure::Forward(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            WorkFailure::Exhausted { .. } => "exhausted",
            WorkFailure::Unreachable { .. } => "unreachable",
            WorkFailure::Forward(_) => "forward_error",
            WorkFailure::ShuttingDown => "shutdown",
        }
    }

    pub fn into_response(self, request_id: &str) -> Response<Body> {
        failure_response(self.status(), &self.to_string(), request_id)
    }
}

/// Per-unit bookkeeping of tried addresses and completed rounds.
#[derive(Debug)]
pub(crate) struct RetryRounds {
    tried: HashSet<AddressRecord>,
    completed: u32,
    max: u32,
}

impl RetryRounds {
    pub(crate) fn new(max: u32) -> Self {
        Self {
            tried: HashSet::new(),
            completed: 0,
            max: max.max(1),
        }
    }

    /// True if `address` has not failed yet in this round.
    pub(crate) fn is_fresh(&self, address: &AddressRecord) -> bool {
        !self.tried.contains(address)
    }

    pub(crate) fn record_failure(&mut self, address: AddressRecord) {
        self.tried.insert(address);
    }

    /// Close the current round. Returns `false` when no rounds remain.
    pub(crate) fn finish_round(&mut self) -> bool {
        self.completed += 1;
        self.tried.clear();
        self.completed < self.max
    }

    pub(crate) fn completed(&self) -> u32 {
        self.completed
    }
}

/// One worker loop. Cheap to clone; clones share the pool and connector.
#[derive(Debug, Clone)]
pub struct Worker {
    id: usize,
    pool: AddressPool,
    connector: Connector,
    forwarder: RequestForwarder,
    backoff: Backoff,
    max_rounds: u32,
    shutdown: ShutdownSignal,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        id: usize,
        pool: AddressPool,
        connector: Connector,
        forwarder: RequestForwarder,
        backoff: Backoff,
        max_rounds: u32,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            id,
            pool,
            connector,
            forwarder,
            backoff,
            max_rounds,
            shutdown,
            state: WorkerState::Idle,
        }
    }

    pub fn from_config(
        id: usize,
        config: &FrontendConfig,
        pool: AddressPool,
        connector: Connector,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self::new(
            id,
            pool,
            connector,
            RequestForwarder::new(config.timeouts.exchange()),
            Backoff::from_config(&config.retries),
            config.retries.max_rounds,
            shutdown,
        )
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Serve work units until the queue is closed and drained.
    pub async fn run(mut self, queue: WorkQueue) {
        tracing::debug!(worker = self.id, "Worker started");
        while let Some(unit) = queue.next().await {
            let span = tracing::info_span!("work", worker = self.id, request_id = %unit.request_id);
            self.handle(unit).instrument(span).await;
        }
        tracing::debug!(worker = self.id, "Worker stopped");
    }

    /// Process one unit and reply to its caller.
    pub async fn handle(&mut self, unit: WorkUnit) {
        let WorkUnit {
            request,
            request_id,
            received_at,
            reply,
        } = unit;

        match self.process(request).await {
            Ok(exchange) => {
                let status = exchange.status();
                let backend = exchange.address().to_string();
                tracing::info!(backend = %backend, status = %status, "Request forwarded");

                let (response, completion) = exchange.into_parts();
                if reply.send(response).is_err() {
                    tracing::debug!("Caller went away before the response was delivered");
                }
                completion.wait().await;
                metrics::record_request("forwarded", status.as_u16(), &backend, received_at);
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "Request failed");
                let status = failure.status();
                let outcome = failure.outcome();
                if reply.send(failure.into_response(&request_id)).is_err() {
                    tracing::debug!("Caller went away before the failure response was delivered");
                }
                metrics::record_request(outcome, status.as_u16(), "none", received_at);
            }
        }

        self.transition(WorkerState::Idle);
    }

    /// Acquire, connect and forward with bounded retry.
    pub async fn process(&mut self, request: Request<Body>) -> Result<Exchange, WorkFailure> {
        let mut rounds = RetryRounds::new(self.max_rounds);
        let mut last_error: Option<ConnectError> = None;

        loop {
            if self.shutdown.is_triggered() {
                return Err(WorkFailure::ShuttingDown);
            }

            self.transition(WorkerState::Acquiring);
            let lease = match self.pool.acquire() {
                Ok(lease) if rounds.is_fresh(lease.address()) => Some(lease),
                // Round-robin came back to an address that already failed.
                Ok(_) => None,
                Err(exhausted) => {
                    tracing::debug!(known = exhausted.known, "Backend pool exhausted");
                    metrics::record_pool_exhausted();
                    None
                }
            };

            let Some(lease) = lease else {
                if !rounds.finish_round() {
                    let rounds = rounds.completed();
                    return Err(match last_error {
                        Some(last) => WorkFailure::Unreachable { rounds, last },
                        None => WorkFailure::Exhausted { rounds },
                    });
                }
                self.pause().await?;
                continue;
            };

            self.transition(WorkerState::Connecting);
            let address = lease.address().clone();
            let connection = match self.connector.connect(lease).await {
                Ok(connection) => connection,
                Err(e) => {
                    rounds.record_failure(address);
                    last_error = Some(e);
                    continue;
                }
            };

            self.transition(WorkerState::Forwarding);
            return self
                .forwarder
                .forward(connection, request)
                .await
                .map_err(WorkFailure::from);
        }
    }

    /// Sleep one backoff, cut short by shutdown.
    async fn pause(&mut self) -> Result<(), WorkFailure> {
        let delay = self.backoff.delay();
        tracing::debug!(worker = self.id, delay = ?delay, "Backing off");
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = self.shutdown.recv() => Err(WorkFailure::ShuttingDown),
        }
    }

    fn transition(&mut self, next: WorkerState) {
        if self.state != next {
            tracing::trace!(worker = self.id, from = %self.state, to = %next, "Worker state");
            self.state = next;
        }
    }
}
