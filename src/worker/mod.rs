//! Worker subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound handler
//!     → dispatch.rs (bounded queue, reply channel per unit)
//!     → worker_loop.rs (N loops: acquire → connect → forward)
//!     → reply with backend response or failure response
//! ```
//!
//! # Design Decisions
//! - Workers share one AddressPool; no ordering or affinity between them
//! - Workers exit when the queue is closed and drained, which is how
//!   shutdown drains in-flight work
//! - A panicking worker is logged and restarted

pub mod dispatch;
pub mod worker_loop;

use tokio::task::JoinHandle;

pub use dispatch::{work_queue, DispatchError, Dispatcher, WorkQueue, WorkUnit};
pub use worker_loop::{WorkFailure, Worker, WorkerState};

/// Spawn `worker` on `queue`, restarting it if it panics.
pub fn spawn_supervised(worker: Worker, queue: WorkQueue) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let handle = tokio::spawn(worker.clone().run(queue.clone()));
            match handle.await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    tracing::error!(worker = worker.id(), "Worker panicked, restarting");
                }
                Err(e) => {
                    tracing::warn!(worker = worker.id(), error = %e, "Worker task cancelled");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::http::RequestForwarder;
    use crate::lifecycle::Shutdown;
    use crate::load_balancer::pool::PoolEntry;
    use crate::load_balancer::round_robin::RoundRobin;
    use crate::load_balancer::{AddressPool, AddressRecord, Selector};
    use crate::net::Connector;
    use crate::resilience::Backoff;

    /// Round-robin that panics on its first selection.
    #[derive(Debug)]
    struct PanicsOnce {
        panicked: bool,
        inner: RoundRobin,
    }

    impl Selector for PanicsOnce {
        fn select(&mut self, entries: &[PoolEntry]) -> Option<usize> {
            if !self.panicked {
                self.panicked = true;
                panic!("selector failure");
            }
            self.inner.select(entries)
        }

        fn removed(&mut self, index: usize) {
            self.inner.removed(index);
        }
    }

    async fn ok_backend() -> AddressRecord {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = AddressRecord::from(listener.local_addr().unwrap());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        address
    }

    #[tokio::test]
    async fn panicking_worker_is_restarted() {
        let pool = AddressPool::with_selector(Box::new(PanicsOnce {
            panicked: false,
            inner: RoundRobin::new(),
        }));
        pool.provision([ok_backend().await]);

        let shutdown = Shutdown::new();
        let worker = Worker::new(
            0,
            pool.clone(),
            Connector::default(),
            RequestForwarder::default(),
            Backoff::fixed(Duration::from_millis(10)),
            1,
            shutdown.subscribe(),
        );
        let (dispatcher, queue) = work_queue(4);
        let handle = spawn_supervised(worker, queue);

        let first = dispatcher
            .submit(Request::new(Body::empty()), "first".into())
            .await;
        assert_eq!(first.unwrap_err(), DispatchError::Dropped);

        let second = dispatcher
            .submit(Request::new(Body::empty()), "second".into())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        drop(dispatcher);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.available, 1);
        assert_eq!(snapshot.checked_out, 0);
    }
}
