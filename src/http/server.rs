//! Host runtime: turns TCP connections into host server events.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve HTTP/1.1 and HTTP/2 via hyper, with upgrades enabled
//! - Emit each parsed request as a `request` or `upgrade` event
//! - Wait for a listener to answer; fall back when none does
//! - Drain connections on shutdown
//!
//! # Design Decisions
//! - Emission happens on the connection task, in delivery order
//! - hyper replays bytes read past the request head through the upgraded
//!   connection itself, so the emitted `head` buffer is always empty
//! - An exchange nobody answers gets 404; one answered too late gets 504

use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::TimeoutConfig;
use crate::http::request::{ensure_request_id, is_upgrade_request};
use crate::http::{ResponseSink, UpgradeSocket};
use crate::net::{ConnectionGuard, ConnectionPermit, ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::server::{EventKind, HostServer};

/// Serves a [`HostServer`] over TCP.
#[derive(Debug)]
pub struct HttpServer {
    host: Arc<HostServer>,
    response_timeout: Duration,
    drain_timeout: Duration,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(host: Arc<HostServer>, timeouts: &TimeoutConfig) -> Self {
        Self {
            host,
            response_timeout: Duration::from_secs(timeouts.response_secs),
            drain_timeout: Duration::from_secs(timeouts.drain_secs),
            tracker: ConnectionTracker::new(),
        }
    }

    pub fn host(&self) -> &Arc<HostServer> {
        &self.host
    }

    /// Accept connections until `shutdown` fires (or its sender is dropped),
    /// then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, server = %self.host.name(), "HTTP server starting");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    let guard = self.tracker.track();
                    let span = tracing::debug_span!(
                        "connection",
                        connection_id = %guard.id(),
                        peer = %peer,
                    );
                    let connection = Connection {
                        host: Arc::clone(&self.host),
                        response_timeout: self.response_timeout,
                        _guard: guard,
                        _permit: permit,
                    };
                    tokio::spawn(connection.serve(stream, shutdown.resubscribe()).instrument(span));
                }
                _ = shutdown.recv() => {
                    tracing::info!("Stopping accept loop");
                    break;
                }
            }
        }

        if !self.tracker.wait_for_drain(self.drain_timeout).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Connections still open after drain deadline"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// One accepted connection.
struct Connection {
    host: Arc<HostServer>,
    response_timeout: Duration,
    _guard: ConnectionGuard,
    _permit: ConnectionPermit,
}

impl Connection {
    async fn serve(self, stream: TcpStream, mut shutdown: broadcast::Receiver<()>) {
        let host = Arc::clone(&self.host);
        let response_timeout = self.response_timeout;
        let service = service_fn(move |req: Request<Incoming>| {
            let host = Arc::clone(&host);
            async move { Ok::<_, Infallible>(deliver(&host, req, response_timeout).await) }
        });

        let builder = auto::Builder::new(TokioExecutor::new());
        let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(e) = result {
            tracing::debug!(error = %e, "Connection ended with error");
        }
    }
}

/// Emit one request on the host server and wait for its answer.
async fn deliver(host: &HostServer, req: Request<Incoming>, response_timeout: Duration) -> Response<Body> {
    let mut req = req.map(Body::new);
    let request_id = ensure_request_id(&mut req);
    let (sink, receiver) = ResponseSink::channel();

    let event = if is_upgrade_request(req.headers()) {
        let on_upgrade = hyper::upgrade::on(&mut req);
        let socket = UpgradeSocket::new(sink, on_upgrade);
        host.emit_upgrade(&req, &socket, &Bytes::new());
        EventKind::Upgrade
    } else {
        host.emit_request(&mut req, &sink);
        drop(sink);
        EventKind::Request
    };
    drop(req);

    match tokio::time::timeout(response_timeout, receiver).await {
        Ok(Ok(response)) => response,
        Ok(Err(_)) => {
            tracing::debug!(request_id = %request_id, event = %event, "No listener answered");
            metrics::record_unanswered(event, StatusCode::NOT_FOUND);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(_) => {
            tracing::warn!(
                request_id = %request_id,
                event = %event,
                timeout = ?response_timeout,
                "Listener did not answer in time"
            );
            metrics::record_unanswered(event, StatusCode::GATEWAY_TIMEOUT);
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

