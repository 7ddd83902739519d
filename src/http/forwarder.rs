//! Single-exchange request forwarding.
//!
//! # Responsibilities
//! - Run one HTTP/1.1 request/response exchange over a connected backend socket
//! - Stream the backend response back without buffering
//! - Keep the lease until the backend connection has finished
//!
//! # Design Decisions
//! - Every exchange sends `Connection: close`; backend connections are never
//!   reused across work units
//! - Mid-exchange failures become `ForwardError`, reported to the caller as 502

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::http::request::prepare_for_backend;
use crate::http::response::strip_hop_by_hop;
use crate::load_balancer::{AddressRecord, Lease};
use crate::net::{Connection, ConnectionGuard};
use crate::resilience::{with_deadline, TimedOut};

/// Failure after a successful connect. The connection is discarded.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("HTTP handshake with {address} failed: {source}")]
    Handshake {
        address: AddressRecord,
        #[source]
        source: hyper::Error,
    },

    #[error("exchange with {address} failed: {source}")]
    Exchange {
        address: AddressRecord,
        #[source]
        source: hyper::Error,
    },

    #[error("exchange with {address} timed out after {after:?}")]
    Timeout {
        address: AddressRecord,
        after: Duration,
    },
}

impl ForwardError {
    pub fn address(&self) -> &AddressRecord {
        match self {
            ForwardError::Handshake { address, .. }
            | ForwardError::Exchange { address, .. }
            | ForwardError::Timeout { address, .. } => address,
        }
    }
}

/// Forwards one request per backend connection.
#[derive(Debug, Clone)]
pub struct RequestForwarder {
    exchange_timeout: Duration,
}

impl RequestForwarder {
    pub fn new(exchange_timeout: Duration) -> Self {
        Self { exchange_timeout }
    }

    /// Send `request` over `connection` and return the backend's response head.
    ///
    /// The response body keeps streaming from the backend after this returns;
    /// [`Completion::wait`] resolves once it is done and releases the lease.
    /// One exchange timeout covers the whole exchange, head and body.
    pub async fn forward(
        &self,
        connection: Connection,
        mut request: Request<Body>,
    ) -> Result<Exchange, ForwardError> {
        let address = connection.address().clone();
        let connection_id = connection.id();
        let (stream, lease, guard) = connection.into_parts();
        let deadline = Instant::now() + self.exchange_timeout;

        let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|source| ForwardError::Handshake {
                address: address.clone(),
                source,
            })?;

        let driver = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %connection_id, error = %e, "Backend connection ended with error");
            }
        });

        prepare_for_backend(&mut request);
        tracing::debug!(
            backend = %address,
            connection_id = %connection_id,
            method = %request.method(),
            uri = %request.uri(),
            "Forwarding request"
        );

        let sent = with_deadline(remaining(deadline), sender.send_request(request)).await;
        drop(sender);

        let response = match sent {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => {
                driver.abort();
                return Err(ForwardError::Exchange { address, source });
            }
            Err(TimedOut(_)) => {
                driver.abort();
                return Err(ForwardError::Timeout {
                    address,
                    after: self.exchange_timeout,
                });
            }
        };

        let (parts, body) = response.into_parts();
        let mut response = Response::from_parts(parts, Body::new(body));
        strip_hop_by_hop(&mut response);

        Ok(Exchange {
            response,
            completion: Completion {
                driver,
                deadline,
                limit: self.exchange_timeout,
                lease,
                _guard: guard,
            },
        })
    }
}

impl Default for RequestForwarder {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// A backend response whose body may still be streaming.
#[derive(Debug)]
pub struct Exchange {
    response: Response<Body>,
    completion: Completion,
}

impl Exchange {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn address(&self) -> &AddressRecord {
        self.completion.lease.address()
    }

    pub fn into_parts(self) -> (Response<Body>, Completion) {
        (self.response, self.completion)
    }
}

/// Tail of an exchange: holds the lease until the backend connection closes.
#[derive(Debug)]
#[must_use = "dropping a completion releases the lease while the body may still stream"]
pub struct Completion {
    driver: JoinHandle<()>,
    deadline: Instant,
    limit: Duration,
    lease: Lease,
    _guard: ConnectionGuard,
}

impl Completion {
    /// Wait for the backend connection to finish, then release the lease.
    ///
    /// Gives up at the deadline set when the exchange started.
    pub async fn wait(mut self) {
        if with_deadline(remaining(self.deadline), &mut self.driver).await.is_err() {
            tracing::warn!(
                backend = %self.lease.address(),
                timeout = ?self.limit,
                "Backend response did not finish in time, closing connection"
            );
            self.driver.abort();
        }
        tracing::trace!(backend = %self.lease.address(), "Exchange complete");
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::AddressPool;
    use crate::net::Connector;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn backend(reply: &'static [u8]) -> AddressRecord {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = AddressRecord::from(listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(reply).await;
            let _ = socket.shutdown().await;
        });
        address
    }

    #[tokio::test]
    async fn lease_is_held_until_completion() {
        let address = backend(
            b"HTTP/1.1 201 Created\r\nContent-Length: 2\r\nConnection: close\r\nKeep-Alive: timeout=5\r\n\r\nok",
        )
        .await;
        let pool = AddressPool::new();
        pool.provision([address]);

        let connection = Connector::default()
            .connect(pool.acquire().unwrap())
            .await
            .unwrap();
        let exchange = RequestForwarder::default()
            .forward(connection, Request::new(Body::empty()))
            .await
            .unwrap();

        assert_eq!(exchange.status(), StatusCode::CREATED);
        let (response, completion) = exchange.into_parts();
        assert!(response.headers().get("keep-alive").is_none());
        assert_eq!(pool.snapshot().checked_out, 1);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");

        completion.wait().await;
        assert_eq!(pool.snapshot().available, 1);
    }

    #[tokio::test]
    async fn garbage_reply_is_an_exchange_error() {
        let address = backend(b"not http at all\r\n\r\n").await;
        let pool = AddressPool::new();
        pool.provision([address.clone()]);

        let connection = Connector::default()
            .connect(pool.acquire().unwrap())
            .await
            .unwrap();
        let err = RequestForwarder::default()
            .forward(connection, Request::new(Body::empty()))
            .await
            .unwrap_err();

        assert!(matches!(err, ForwardError::Exchange { .. }));
        assert_eq!(err.address(), &address);
        assert_eq!(pool.snapshot().available, 1);
    }

    #[tokio::test]
    async fn one_deadline_covers_head_and_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = AddressRecord::from(listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(Duration::from_millis(1200)).await;
            let _ = socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\nabc")
                .await;
            // Never finish the body.
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let pool = AddressPool::new();
        pool.provision([address]);
        let connection = Connector::default()
            .connect(pool.acquire().unwrap())
            .await
            .unwrap();

        let start = std::time::Instant::now();
        let exchange = RequestForwarder::new(Duration::from_secs(2))
            .forward(connection, Request::new(Body::empty()))
            .await
            .unwrap();
        let (_response, completion) = exchange.into_parts();
        completion.wait().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1900), "released early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(2800), "deadline restarted: {elapsed:?}");
        assert_eq!(pool.snapshot().available, 1);
    }
}
