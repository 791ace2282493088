//! Listener traits for the two host events.
//!
//! Listeners receive the emitting server as an explicit first argument
//! instead of relying on any captured calling context. Plain closures with
//! the matching signature implement the traits directly.

use axum::body::{Body, Bytes};
use axum::http::Request;
use std::fmt;
use std::sync::Arc;

use crate::http::{ResponseSink, UpgradeSocket};
use crate::server::HostServer;

/// The two events a host server emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Request,
    Upgrade,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Request => "request",
            EventKind::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handles a `request` event.
pub trait RequestListener: Send + Sync {
    fn on_request(&self, server: &HostServer, req: &mut Request<Body>, res: &ResponseSink);
}

/// Handles an `upgrade` event. `head` holds any bytes the runtime read past
/// the request head before emitting.
pub trait UpgradeListener: Send + Sync {
    fn on_upgrade(
        &self,
        server: &HostServer,
        req: &Request<Body>,
        socket: &UpgradeSocket,
        head: &Bytes,
    );
}

impl<F> RequestListener for F
where
    F: Fn(&HostServer, &mut Request<Body>, &ResponseSink) + Send + Sync,
{
    fn on_request(&self, server: &HostServer, req: &mut Request<Body>, res: &ResponseSink) {
        self(server, req, res)
    }
}

impl<F> UpgradeListener for F
where
    F: Fn(&HostServer, &Request<Body>, &UpgradeSocket, &Bytes) + Send + Sync,
{
    fn on_upgrade(
        &self,
        server: &HostServer,
        req: &Request<Body>,
        socket: &UpgradeSocket,
        head: &Bytes,
    ) {
        self(server, req, socket, head)
    }
}

/// Shared handle to a registered request listener.
pub type RequestListenerRef = Arc<dyn RequestListener>;

/// Shared handle to a registered upgrade listener.
pub type UpgradeListenerRef = Arc<dyn UpgradeListener>;

/// Identity comparison for listener handles (ignores vtable differences).
pub fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
