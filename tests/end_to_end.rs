//! Full-stack tests: a real host runtime on an ephemeral port, an axum host
//! application and a hub spliced in front of it.

mod common;

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode, Uri};
use axum::routing::get;
use axum::{Json, Router};
use hub_splice::{
    attach, AttachedRouter, HostServer, RouteOptions, ServiceListener, UpgradeListener,
    UpgradeSocket,
};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::{read_until, start_host, upgrade_head};

const DUMMY_PROTOCOL: &str = "YetiDummyProtocol/1.0";

/// Answers `protocol` upgrades with 101, writes `greeting` and closes.
fn greeting_upgrades(protocol: &'static str, greeting: &'static str) -> impl UpgradeListener {
    move |_: &HostServer, req: &Request<Body>, socket: &UpgradeSocket, _: &Bytes| {
        if req.headers().get(header::UPGRADE).map(|v| v != protocol).unwrap_or(true) {
            return;
        }
        let Some(pending) = socket.take() else {
            return;
        };
        let upgrade = pending.switching_protocols(protocol).unwrap();
        tokio::spawn(async move {
            let mut io = TokioIo::new(upgrade.await.unwrap());
            io.write_all(greeting.as_bytes()).await.unwrap();
            io.shutdown().await.unwrap();
        });
    }
}

/// Echoes whatever the client sends after the handshake.
fn echo_upgrades(protocol: &'static str) -> impl UpgradeListener {
    move |_: &HostServer, _: &Request<Body>, socket: &UpgradeSocket, _: &Bytes| {
        let Some(pending) = socket.take() else {
            return;
        };
        let upgrade = pending.switching_protocols(protocol).unwrap();
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(TokioIo::new(upgrade.await.unwrap()));
            let _ = tokio::io::copy(&mut reader, &mut writer).await;
        });
    }
}

fn host_app() -> Router {
    Router::new().route("/", get(|| async { "host application" }))
}

fn hub_app() -> Router {
    Router::new()
        .route("/", get(|| async { "hub capture page" }))
        .route("/echo", get(|uri: Uri| async move { uri.to_string() }))
        .route("/status", get(|| async { Json(json!({ "status": "operational" })) }))
}

/// Host with the host app and a dummy-protocol upgrade listener, hub spliced
/// in at `/yeti`.
async fn setup() -> (SocketAddr, AttachedRouter, hub_splice::Shutdown) {
    let host = Arc::new(HostServer::new("host"));
    host.on_request(ServiceListener::new(host_app()));
    host.on_upgrade(greeting_upgrades(DUMMY_PROTOCOL, "dogcow"));

    let hub = Arc::new(HostServer::new("hub"));
    hub.on_request(ServiceListener::new(hub_app()));
    hub.on_upgrade(echo_upgrades("Blizzard-Yeti"));

    let router = attach(&host, hub, RouteOptions::default()).unwrap();
    let (addr, shutdown) = start_host(host).await;
    (addr, router, shutdown)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn host_routes_still_reach_host_app() {
    let (addr, _router, _shutdown) = setup().await;

    let resp = client().get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "host application");
}

#[tokio::test]
async fn prefixed_routes_reach_hub_rewritten() {
    let (addr, _router, _shutdown) = setup().await;

    let resp = client().get(format!("http://{addr}/yeti")).send().await.unwrap();
    assert_eq!(resp.text().await.unwrap(), "hub capture page");

    let resp = client()
        .get(format!("http://{addr}/yeti/echo?id=5"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "/echo?id=5");

    let status: Value = client()
        .get(format!("http://{addr}/yeti/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
}

#[tokio::test]
async fn unknown_host_route_uses_host_fallback() {
    let (addr, _router, _shutdown) = setup().await;

    let resp = client()
        .get(format!("http://{addr}/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn foreign_upgrade_reaches_original_listener() {
    let (addr, _router, _shutdown) = setup().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(upgrade_head("/", DUMMY_PROTOCOL).as_bytes())
        .await
        .unwrap();

    let reply = read_until(&mut stream, "dogcow").await;
    assert!(reply.starts_with("HTTP/1.1 101"), "unexpected reply: {reply}");
    assert!(reply.ends_with("dogcow"), "unexpected reply: {reply}");
}

#[tokio::test]
async fn native_upgrade_is_served_by_hub() {
    let (addr, _router, _shutdown) = setup().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(upgrade_head("/anywhere/at/all", "Blizzard-Yeti").as_bytes())
        .await
        .unwrap();

    let handshake = read_until(&mut stream, "\r\n\r\n").await;
    assert!(handshake.starts_with("HTTP/1.1 101"), "unexpected reply: {handshake}");
    assert!(handshake.to_ascii_lowercase().contains("upgrade: blizzard-yeti"));

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn unhandled_upgrade_gets_not_found() {
    let (addr, _router, _shutdown) = setup().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(upgrade_head("/chat", "websocket").as_bytes())
        .await
        .unwrap();

    let reply = read_until(&mut stream, "\r\n\r\n").await;
    assert!(reply.starts_with("HTTP/1.1 404"), "unexpected reply: {reply}");
}

#[tokio::test]
async fn detached_router_stops_claiming() {
    let (addr, router, _shutdown) = setup().await;
    router.detach();

    let resp = client().get(format!("http://{addr}/yeti")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
