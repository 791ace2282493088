//! Attach a router in front of a server's existing listeners.

use axum::body::{Body, Bytes};
use axum::http::Request;
use std::sync::Arc;
use thiserror::Error;

use crate::http::{ResponseSink, UpgradeSocket};
use crate::routing::{RouteError, RouteForwarder, RouteOptions, SubApplication};
use crate::server::{
    EventKind, HostServer, RegistryError, RequestListener, RequestListenerRef, UpgradeListener,
    UpgradeListenerRef,
};

/// Errors returned by [`attach`].
#[derive(Debug, Error)]
pub enum AttachError {
    /// The server already has a router for this event.
    #[error("a router is already attached to `{0}` events on this server")]
    AlreadyAttached(EventKind),

    /// Route options failed validation.
    #[error("invalid route options: {0}")]
    InvalidRoute(#[from] RouteError),

    /// Installing the replacement listener failed; nothing was changed.
    #[error("failed to install `{event}` listener: {source}")]
    Install {
        event: EventKind,
        #[source]
        source: RegistryError,
    },
}

/// Replacement `request` listener.
struct SplicedRequest {
    forwarder: Arc<RouteForwarder>,
    originals: Arc<Vec<RequestListenerRef>>,
}

impl RequestListener for SplicedRequest {
    fn on_request(&self, server: &HostServer, req: &mut Request<Body>, res: &ResponseSink) {
        if self.forwarder.forward_request(req, res).is_claimed() {
            return;
        }
        for listener in self.originals.iter() {
            listener.on_request(server, req, res);
        }
    }
}

/// Replacement `upgrade` listener.
struct SplicedUpgrade {
    forwarder: Arc<RouteForwarder>,
    originals: Arc<Vec<UpgradeListenerRef>>,
}

impl UpgradeListener for SplicedUpgrade {
    fn on_upgrade(
        &self,
        server: &HostServer,
        req: &Request<Body>,
        socket: &UpgradeSocket,
        head: &Bytes,
    ) {
        if self.forwarder.forward_upgrade(req, socket, head).is_claimed() {
            return;
        }
        for listener in self.originals.iter() {
            listener.on_upgrade(server, req, socket, head);
        }
    }
}

/// Listener snapshots taken at attach time.
struct Capture {
    requests: Arc<Vec<RequestListenerRef>>,
    upgrades: Arc<Vec<UpgradeListenerRef>>,
}

/// A router spliced into a host server.
///
/// Dropping the handle leaves the router in place; call
/// [`AttachedRouter::detach`] to undo the splice.
pub struct AttachedRouter {
    server: Arc<HostServer>,
    forwarder: Arc<RouteForwarder>,
    request: RequestListenerRef,
    upgrade: UpgradeListenerRef,
    captured: Capture,
}

impl AttachedRouter {
    /// The claimed path prefix.
    pub fn route(&self) -> &str {
        self.forwarder.route()
    }

    /// The server the router is attached to.
    pub fn server(&self) -> &Arc<HostServer> {
        &self.server
    }

    /// How many listeners were captured for `event` at attach time.
    pub fn captured_count(&self, event: EventKind) -> usize {
        match event {
            EventKind::Request => self.captured.requests.len(),
            EventKind::Upgrade => self.captured.upgrades.len(),
        }
    }

    /// Remove the router and put the captured listeners back in place.
    pub fn detach(self) -> Arc<HostServer> {
        let requests = self.server.request_registry();
        let upgrades = self.server.upgrade_registry();

        requests.restore(&self.request, &self.captured.requests);
        upgrades.restore(&self.upgrade, &self.captured.upgrades);
        requests.release();
        upgrades.release();

        tracing::info!(server = %self.server.name(), route = %self.route(), "Router detached");
        self.server
    }
}

impl std::fmt::Debug for AttachedRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachedRouter")
            .field("server", &self.server.name())
            .field("route", &self.route())
            .field("captured_requests", &self.captured.requests.len())
            .field("captured_upgrades", &self.captured.upgrades.len())
            .finish()
    }
}

/// Splice a router for `options` into `server`, forwarding claimed traffic
/// to `app`.
///
/// Fails without touching the server if the options are invalid or a
/// router is already attached. If installing the replacement listeners
/// fails, any partial install is rolled back.
pub fn attach(
    server: &Arc<HostServer>,
    app: Arc<dyn SubApplication>,
    options: RouteOptions,
) -> Result<AttachedRouter, AttachError> {
    let forwarder = Arc::new(RouteForwarder::new(options, app)?);
    claim(server)?;
    let captured = capture(server);
    install(server, forwarder, captured)
}

fn claim(server: &HostServer) -> Result<(), AttachError> {
    if !server.request_registry().claim() {
        return Err(AttachError::AlreadyAttached(EventKind::Request));
    }
    if !server.upgrade_registry().claim() {
        server.request_registry().release();
        return Err(AttachError::AlreadyAttached(EventKind::Upgrade));
    }
    Ok(())
}

fn release(server: &HostServer) {
    server.request_registry().release();
    server.upgrade_registry().release();
}

fn capture(server: &HostServer) -> Capture {
    Capture {
        requests: server.request_listeners(),
        upgrades: server.upgrade_listeners(),
    }
}

fn install(
    server: &Arc<HostServer>,
    forwarder: Arc<RouteForwarder>,
    captured: Capture,
) -> Result<AttachedRouter, AttachError> {
    let request: RequestListenerRef = Arc::new(SplicedRequest {
        forwarder: Arc::clone(&forwarder),
        originals: Arc::clone(&captured.requests),
    });
    let upgrade: UpgradeListenerRef = Arc::new(SplicedUpgrade {
        forwarder: Arc::clone(&forwarder),
        originals: Arc::clone(&captured.upgrades),
    });

    let requests = server.request_registry();
    let upgrades = server.upgrade_registry();

    if let Err(source) = requests.replace_if_unchanged(&captured.requests, vec![Arc::clone(&request)]) {
        release(server);
        return Err(AttachError::Install {
            event: EventKind::Request,
            source,
        });
    }

    if let Err(source) = upgrades.replace_if_unchanged(&captured.upgrades, vec![Arc::clone(&upgrade)]) {
        requests.restore(&request, &captured.requests);
        release(server);
        tracing::error!(
            server = %server.name(),
            error = %source,
            "Attach rolled back"
        );
        return Err(AttachError::Install {
            event: EventKind::Upgrade,
            source,
        });
    }

    tracing::info!(
        server = %server.name(),
        route = %forwarder.route(),
        request_listeners = captured.requests.len(),
        upgrade_listeners = captured.upgrades.len(),
        "Router attached"
    );

    Ok(AttachedRouter {
        server: Arc::clone(server),
        forwarder,
        request,
        upgrade,
        captured,
    })
}
