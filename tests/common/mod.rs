//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use vestibule::engine::Engine;
use vestibule::http::HttpServer;
use vestibule::lifecycle::Shutdown;
use vestibule::net::Listener;

/// Start the engine's HTTP server on an ephemeral port.
///
/// Returns the bound address and the shutdown handle; trigger it at the end
/// of the test to stop the accept loop.
pub async fn start_server(engine: Arc<Engine>) -> (SocketAddr, Shutdown) {
    let mut listener_config = engine.config().listener.clone();
    listener_config.bind_address = "127.0.0.1:0".to_string();

    let listener = Listener::bind(&listener_config).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = HttpServer::new(engine).run(listener, rx).await;
    });

    // Give the accept loop a beat to start.
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

/// Non-pooled client so dropped-connection tests never reuse a socket.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
