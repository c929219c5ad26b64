//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use sense_backend::config::{AppConfig, PoolConfig};
use sense_backend::http::{HttpServer, Routes};
use sense_backend::lifecycle::Shutdown;
use sense_backend::pool::Pools;
use tokio::net::TcpListener;

/// A server running in the background; stops when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve `routes` on an ephemeral local port with the given request budget.
pub async fn start_server(routes: Routes, budget: Duration) -> TestServer {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.timeouts.request_secs = budget.as_secs().max(1);

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, routes, Pools::new(&PoolConfig::default()));
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
