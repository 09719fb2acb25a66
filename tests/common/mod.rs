//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use blockport::config::ApiConfig;
use blockport::ApiService;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// API config on an ephemeral loopback port.
pub fn api_config(max_connections: usize, timeout_ms: u64) -> ApiConfig {
    ApiConfig {
        port: 0,
        max_connections,
        timeout_ms,
        drain_timeout_ms: 500,
    }
}

/// Start a service and return it with its bound address.
pub async fn start_service(max_connections: usize, timeout_ms: u64) -> (ApiService, SocketAddr) {
    let service = ApiService::new();
    let addr = service
        .start(&api_config(max_connections, timeout_ms))
        .await
        .expect("service should start");
    (service, addr)
}

/// Read until the server closes. A reset counts as closed with whatever arrived.
pub async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return response,
            Ok(n) => response.extend_from_slice(&buf[..n]),
        }
    }
}

/// Send one request and collect the full response (empty if dropped).
pub async fn request(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    // A connection dropped at admission may already be reset.
    if stream.write_all(payload).await.is_err() {
        return Vec::new();
    }
    tokio::time::timeout(Duration::from_secs(5), read_until_closed(&mut stream))
        .await
        .expect("server should close the connection")
}

/// Poll until the service reports `expected` active sessions.
pub async fn wait_for_active(service: &ApiService, expected: usize) {
    for _ in 0..300 {
        if service.active_sessions().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "active sessions stuck at {}, expected {}",
        service.active_sessions().await,
        expected
    );
}
