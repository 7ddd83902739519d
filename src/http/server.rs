//! Front-end server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the selected inbound handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Start the refresher and the worker loops sharing one pool
//! - Serve until shutdown, then drain workers and backend connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, Request, Response, StatusCode},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::FrontendConfig;
use crate::discovery::{DnsResolver, Refresher, Resolve};
use crate::http::apps::{self, App};
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::failure_response;
use crate::lifecycle::startup::StartupError;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::load_balancer::{AddressPool, AddressRecord};
use crate::net::Connector;
use crate::observability::metrics;
use crate::worker::{spawn_supervised, work_queue, DispatchError, Dispatcher, Worker};

/// Application state injected into the inbound handler.
#[derive(Clone)]
pub struct AppState {
    pub app: App,
    pub dispatcher: Dispatcher,
}

/// The front-end: accepts inbound requests and hands them to worker loops.
pub struct FrontEndServer {
    config: FrontendConfig,
    app: App,
    backend: AddressRecord,
    pool: AddressPool,
    resolver: Arc<dyn Resolve>,
}

impl FrontEndServer {
    /// Create a server from validated configuration.
    ///
    /// Fails if the app reference or the backend name cannot be resolved
    /// locally; nothing is bound or spawned yet.
    pub fn new(config: FrontendConfig) -> Result<Self, StartupError> {
        let app = App::resolve(&config.app.reference)?;
        let backend = config
            .backend
            .connect
            .parse()
            .map_err(|source| StartupError::InvalidConnect {
                value: config.backend.connect.clone(),
                source,
            })?;

        Ok(Self {
            config,
            app,
            backend,
            pool: AddressPool::new(),
            resolver: Arc::new(DnsResolver::new()),
        })
    }

    /// Replace the DNS resolver used for the backend name.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Handle to the shared backend pool.
    pub fn pool(&self) -> AddressPool {
        self.pool.clone()
    }

    pub fn app(&self) -> App {
        self.app
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FrontendConfig, state: AppState) -> Router {
        let x_request_id = HeaderName::from_static(X_REQUEST_ID);

        Router::new()
            .fallback(inbound_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(config.timeouts.request()))
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let worker_count = self.config.workers.count.max(1);
        tracing::info!(
            address = %addr,
            app = self.app.reference(),
            backend = %self.backend,
            workers = worker_count,
            "Front-end server starting"
        );

        let refresher = Refresher::new(
            self.backend.clone(),
            self.resolver.clone(),
            self.pool.clone(),
            self.config.backend.refresh_interval(),
        );
        if let Err(e) = refresher.refresh_once().await {
            tracing::warn!(error = %e, "Initial backend resolution failed, starting with an empty pool");
        }
        let refresher_shutdown = Shutdown::new();
        let refresher_task = tokio::spawn(refresher.run(refresher_shutdown.subscribe()));

        let connector = Connector::from_config(&self.config);
        let (dispatcher, queue) = work_queue(self.config.workers.queue_depth);
        let workers: Vec<_> = (0..worker_count)
            .map(|id| {
                let worker = Worker::from_config(
                    id,
                    &self.config,
                    self.pool.clone(),
                    connector.clone(),
                    shutdown.clone(),
                );
                spawn_supervised(worker, queue.clone())
            })
            .collect();
        drop(queue);

        let state = AppState {
            app: self.app,
            dispatcher,
        };
        let app = Self::build_router(&self.config, state)
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.recv().await })
            .await?;

        tracing::info!("Stopped accepting, draining workers");
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Worker task did not exit cleanly");
            }
        }

        if !connector
            .tracker()
            .wait_idle(self.config.timeouts.exchange())
            .await
        {
            tracing::warn!(
                open = connector.tracker().active_count(),
                "Backend connections still open after drain"
            );
        }

        refresher_shutdown.trigger();
        if let Err(e) = refresher_task.await {
            tracing::warn!(error = %e, "Refresher task did not exit cleanly");
        }

        let snapshot = self.pool.snapshot();
        if snapshot.checked_out > 0 {
            tracing::warn!(
                checked_out = snapshot.checked_out,
                total = snapshot.total,
                "Pool still has leased addresses at shutdown"
            );
        } else {
            tracing::info!(total = snapshot.total, "Front-end server stopped");
        }
        Ok(())
    }
}

/// Inbound handler: runs the selected app for every path and method.
async fn inbound_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response<Body> {
    let request_id = request_id(&request);
    tracing::debug!(
        request_id = %request_id,
        peer = %peer,
        method = %request.method(),
        path = %request.uri().path(),
        "Inbound request"
    );

    match state.app {
        App::Echo => apps::echo(request).await,
        App::Forward => {
            let start = Instant::now();
            match state.dispatcher.submit(request, request_id.clone()).await {
                Ok(response) => response,
                Err(e) => {
                    let status = dispatch_status(e);
                    tracing::warn!(request_id = %request_id, error = %e, "Request not dispatched");
                    metrics::record_request("rejected", status.as_u16(), "none", start);
                    failure_response(status, &e.to_string(), &request_id)
                }
            }
        }
    }
}

fn dispatch_status(error: DispatchError) -> StatusCode {
    match error {
        DispatchError::QueueFull | DispatchError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Dropped => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn config(connect: &str, app: &str) -> FrontendConfig {
        let mut config = FrontendConfig::default();
        config.backend.connect = connect.into();
        config.app.reference = app.into();
        config
    }

    #[test]
    fn new_resolves_app_and_backend() {
        let server = FrontEndServer::new(config("backend.internal:8080", "frontend:forward")).unwrap();
        assert_eq!(server.app(), App::Forward);
        assert!(server.pool().is_empty());
    }

    #[test]
    fn new_rejects_unknown_app() {
        let result = FrontEndServer::new(config("backend.internal:8080", "myapp:missing"));
        assert!(matches!(result, Err(StartupError::App(_))));
    }

    #[test]
    fn new_rejects_bad_backend_name() {
        let result = FrontEndServer::new(config("backend.internal", "frontend:forward"));
        assert!(matches!(result, Err(StartupError::InvalidConnect { .. })));
    }

    fn inbound(uri: &str) -> Request<Body> {
        let mut request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
        request
    }

    #[tokio::test]
    async fn router_sets_request_id_on_every_path() {
        let (dispatcher, _queue) = work_queue(1);
        let state = AppState {
            app: App::Echo,
            dispatcher,
        };
        let router = FrontEndServer::build_router(&FrontendConfig::default(), state);

        let response = router.oneshot(inbound("/any/path")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = response.headers().get(X_REQUEST_ID).unwrap().to_str().unwrap();
        assert_eq!(id.len(), 36);
    }

    #[tokio::test]
    async fn closed_queue_yields_service_unavailable() {
        let (dispatcher, queue) = work_queue(1);
        drop(queue);
        let state = AppState {
            app: App::Forward,
            dispatcher,
        };
        let router = FrontEndServer::build_router(&FrontendConfig::default(), state);

        let response = router.oneshot(inbound("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn dispatch_failures_map_to_statuses() {
        assert_eq!(dispatch_status(DispatchError::QueueFull), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(dispatch_status(DispatchError::Closed), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(dispatch_status(DispatchError::Dropped), StatusCode::BAD_GATEWAY);
    }
}
