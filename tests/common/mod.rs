//! Shared utilities for integration tests.
#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::http::Request;
use hub_splice::config::TimeoutConfig;
use hub_splice::net::Listener;
use hub_splice::{HostServer, HttpServer, RequestListener, ResponseSink, Shutdown, UpgradeListener, UpgradeSocket};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

/// Ordered record of which listener saw what.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn upgrade_request(uri: &str, protocol: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Connection", "Upgrade")
        .header("Upgrade", protocol)
        .body(Body::empty())
        .unwrap()
}

/// A socket not backed by a connection, for in-process dispatch tests.
pub fn detached_socket() -> UpgradeSocket {
    let (sink, _rx) = ResponseSink::channel();
    UpgradeSocket::new(sink, hyper::upgrade::on(&mut Request::new(())))
}

/// Logs `"<tag> <server> <uri>"` for every request.
pub fn recording_requests(log: &Log, tag: &'static str) -> impl RequestListener {
    let log = Arc::clone(log);
    move |server: &HostServer, req: &mut Request<Body>, _res: &ResponseSink| {
        log.lock()
            .unwrap()
            .push(format!("{tag} {} {}", server.name(), req.uri()));
    }
}

/// Logs `"<tag> <server> <uri>"` for every upgrade.
pub fn recording_upgrades(log: &Log, tag: &'static str) -> impl UpgradeListener {
    let log = Arc::clone(log);
    move |server: &HostServer, req: &Request<Body>, _socket: &UpgradeSocket, _head: &Bytes| {
        log.lock()
            .unwrap()
            .push(format!("{tag} {} {}", server.name(), req.uri()));
    }
}

/// Serve `host` on an ephemeral port. Keep the returned `Shutdown` alive
/// for as long as the server should run.
pub async fn start_host(host: Arc<HostServer>) -> (SocketAddr, Shutdown) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(tcp, 64).unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let timeouts = TimeoutConfig {
        response_secs: 5,
        drain_secs: 1,
    };
    let server = HttpServer::new(host, &timeouts);
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    (addr, shutdown)
}

/// Read from `stream` until `needle` shows up, EOF, or five seconds pass.
pub async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    while !String::from_utf8_lossy(&buf).contains(needle) {
        match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

/// Raw HTTP/1.1 upgrade request head.
pub fn upgrade_head(path: &str, protocol: &str) -> String {
    format!(
        "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\nUpgrade: {protocol}\r\n\r\n"
    )
}
