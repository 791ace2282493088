//! hub-splice demo host.
//!
//! Serves a small host application and splices a hub into it:
//!
//! ```text
//!                ┌──────────────── host server ────────────────┐
//!   request ───▶ │ spliced listener ──▶ /yeti/* ──▶ hub         │
//!                │        │                                     │
//!                │        └── anything else ──▶ host app        │
//!   upgrade ───▶ │ spliced listener ──▶ Blizzard-Yeti ──▶ hub   │
//!                │        └── anything else ──▶ (no listener)   │
//!                └──────────────────────────────────────────────┘
//! ```

use axum::body::{Body, Bytes};
use axum::http::{header, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use hub_splice::config::{load_config, SpliceConfig};
use hub_splice::net::Listener;
use hub_splice::observability::{logging, metrics};
use hub_splice::{
    attach, HostServer, HttpServer, RouteOptions, ServiceListener, Shutdown, UpgradeListener,
    UpgradeSocket,
};

#[derive(Parser)]
#[command(name = "hub-splice")]
#[command(about = "Host application with a test hub spliced into its server", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn host_app() -> Router {
    Router::new()
        .route("/", get(|| async { "host application" }))
        .layer(TraceLayer::new_for_http())
}

fn hub_app(route: String) -> Router {
    Router::new()
        .route("/", get(|| async { "hub capture page" }))
        .route(
            "/status",
            get(move || {
                let route = route.clone();
                async move {
                    Json(json!({
                        "version": env!("CARGO_PKG_VERSION"),
                        "route": route,
                        "status": "operational",
                    }))
                }
            }),
        )
        .layer(TraceLayer::new_for_http())
}

/// Accepts the hub's native protocol and echoes bytes back.
fn hub_upgrades(token: String) -> impl UpgradeListener {
    move |_hub: &HostServer, req: &Request<Body>, socket: &UpgradeSocket, _head: &Bytes| {
        let native = req
            .headers()
            .get(header::UPGRADE)
            .map(|v| v == token.as_str())
            .unwrap_or(false);

        let Some(pending) = socket.take() else {
            return;
        };
        if !native {
            pending.reject(StatusCode::NOT_IMPLEMENTED);
            return;
        }

        let upgrade = match pending.switching_protocols(&token) {
            Ok(upgrade) => upgrade,
            Err(e) => {
                tracing::warn!(error = %e, "Could not answer hub handshake");
                return;
            }
        };

        tokio::spawn(async move {
            match upgrade.await {
                Ok(upgraded) => {
                    let (mut reader, mut writer) = tokio::io::split(TokioIo::new(upgraded));
                    if let Err(e) = tokio::io::copy(&mut reader, &mut writer).await {
                        tracing::debug!(error = %e, "Hub echo ended");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Hub upgrade failed"),
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SpliceConfig::default(),
    };

    logging::init_tracing(&config.observability.log_level);
    tracing::info!("hub-splice v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let host = Arc::new(HostServer::new("host"));
    host.on_request(ServiceListener::new(host_app()));

    let hub = Arc::new(HostServer::new("hub"));
    hub.on_request(ServiceListener::new(hub_app(config.route.prefix.clone())));
    hub.on_upgrade(hub_upgrades(config.route.upgrade_token.clone()));

    let router = attach(&host, hub, RouteOptions::from(&config.route))?;

    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    tokio::spawn(shutdown.clone().trigger_on_ctrl_c());

    HttpServer::new(Arc::clone(&host), &config.timeouts)
        .run(listener, shutdown.subscribe())
        .await?;

    router.detach();
    tracing::info!("Shutdown complete");
    Ok(())
}
