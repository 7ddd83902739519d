//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pool_frontend::config::FrontendConfig;
use pool_frontend::discovery::StaticResolver;
use pool_frontend::http::FrontEndServer;
use pool_frontend::lifecycle::Shutdown;
use pool_frontend::load_balancer::{AddressPool, AddressRecord};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Read until the end of the request head.
async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

/// Start a simple mock backend that returns a fixed body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_head| async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. `f` receives the raw request head.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let head = read_request_head(&mut socket).await;
                        let (status, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Forwarding configuration tuned for fast tests.
pub fn forward_config() -> FrontendConfig {
    let mut config = FrontendConfig::default();
    config.backend.connect = "backend.test:8080".into();
    config.backend.refresh_interval_secs = 1;
    config.retries.backoff_ms = 20;
    config.retries.max_rounds = 2;
    config.timeouts.connect_secs = 2;
    config.app.reference = "frontend:forward".into();
    config
}

/// A front-end running in the background.
pub struct RunningFrontend {
    pub addr: SocketAddr,
    pub pool: AddressPool,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl RunningFrontend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server to finish draining.
    pub async fn stop(self) -> AddressPool {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("front-end did not stop in time")
            .unwrap()
            .unwrap();
        self.pool
    }
}

/// Start a front-end whose backend name resolves through `resolver`.
pub async fn start_frontend(config: FrontendConfig, resolver: StaticResolver) -> RunningFrontend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = FrontEndServer::new(config)
        .unwrap()
        .with_resolver(Arc::new(resolver));
    let pool = server.pool();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    RunningFrontend {
        addr,
        pool,
        shutdown,
        handle,
    }
}

pub fn records(addrs: &[SocketAddr]) -> Vec<AddressRecord> {
    addrs.iter().copied().map(AddressRecord::from).collect()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
