//! Hand-off of inbound work units to worker loops.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, Response},
};
use thiserror::Error;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot, Mutex,
};

/// One inbound request waiting for a worker.
#[derive(Debug)]
pub struct WorkUnit {
    pub request: Request<Body>,
    pub request_id: String,
    pub received_at: Instant,
    pub reply: oneshot::Sender<Response<Body>>,
}

/// Why a work unit could not be handed to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("work queue is full")]
    QueueFull,

    #[error("front-end is shutting down")]
    Closed,

    #[error("worker dropped the work unit")]
    Dropped,
}

/// Sending side of the work queue, held by the inbound handler.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<WorkUnit>,
}

impl Dispatcher {
    /// Queue `request` and wait for a worker's response.
    pub async fn submit(
        &self,
        request: Request<Body>,
        request_id: String,
    ) -> Result<Response<Body>, DispatchError> {
        let (reply, response) = oneshot::channel();
        let unit = WorkUnit {
            request,
            request_id,
            received_at: Instant::now(),
            reply,
        };

        self.tx.try_send(unit).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::QueueFull,
            TrySendError::Closed(_) => DispatchError::Closed,
        })?;

        response.await.map_err(|_| DispatchError::Dropped)
    }
}

/// Receiving side of the work queue, shared by all worker loops.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    rx: Arc<Mutex<mpsc::Receiver<WorkUnit>>>,
}

impl WorkQueue {
    /// Next work unit, or `None` once every dispatcher is gone and the queue is drained.
    pub async fn next(&self) -> Option<WorkUnit> {
        self.rx.lock().await.recv().await
    }
}

/// Create a bounded work queue.
pub fn work_queue(depth: usize) -> (Dispatcher, WorkQueue) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (
        Dispatcher { tx },
        WorkQueue {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn unit_round_trips_through_queue() {
        let (dispatcher, queue) = work_queue(4);

        let worker = tokio::spawn(async move {
            let unit = queue.next().await.unwrap();
            assert_eq!(unit.request_id, "req-1");
            let _ = unit.reply.send(Response::new(Body::from("done")));
        });

        let response = dispatcher
            .submit(Request::new(Body::empty()), "req-1".into())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_is_rejected() {
        let (dispatcher, _queue) = work_queue(1);

        let first = dispatcher.clone();
        tokio::spawn(async move {
            let _ = first.submit(Request::new(Body::empty()), "a".into()).await;
        });
        tokio::task::yield_now().await;

        let result = dispatcher
            .submit(Request::new(Body::empty()), "b".into())
            .await;
        assert_eq!(result.unwrap_err(), DispatchError::QueueFull);
    }

    #[tokio::test]
    async fn closed_queue_is_reported() {
        let (dispatcher, queue) = work_queue(1);
        drop(queue);
        let result = dispatcher.submit(Request::new(Body::empty()), "a".into()).await;
        assert_eq!(result.unwrap_err(), DispatchError::Closed);
    }

    #[tokio::test]
    async fn dropped_unit_is_reported() {
        let (dispatcher, queue) = work_queue(1);
        tokio::spawn(async move {
            let unit = queue.next().await.unwrap();
            drop(unit);
        });
        let result = dispatcher.submit(Request::new(Body::empty()), "a".into()).await;
        assert_eq!(result.unwrap_err(), DispatchError::Dropped);
    }

    #[tokio::test]
    async fn queue_ends_when_dispatchers_drop() {
        let (dispatcher, queue) = work_queue(1);
        drop(dispatcher);
        assert!(queue.next().await.is_none());
    }
}
