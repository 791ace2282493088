//! The host server handle.

use axum::body::{Body, Bytes};
use axum::http::Request;
use std::sync::Arc;

use crate::http::{ResponseSink, UpgradeSocket};
use crate::server::listener::{
    EventKind, RequestListener, RequestListenerRef, UpgradeListener, UpgradeListenerRef,
};
use crate::server::registry::EventRegistry;

/// An event-emitting server: the object listeners register on and the host
/// runtime emits parsed requests and upgrades through.
///
/// The sub-application (hub) is a `HostServer` too; forwarding to it is just
/// emitting on its registries.
#[derive(Debug)]
pub struct HostServer {
    name: String,
    requests: EventRegistry<dyn RequestListener>,
    upgrades: EventRegistry<dyn UpgradeListener>,
}

impl HostServer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requests: EventRegistry::new(EventKind::Request),
            upgrades: EventRegistry::new(EventKind::Upgrade),
        }
    }

    /// Name used in log output.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a request listener; returns the stored handle.
    pub fn on_request(&self, listener: impl RequestListener + 'static) -> RequestListenerRef {
        let listener: RequestListenerRef = Arc::new(listener);
        self.requests.add(Arc::clone(&listener));
        listener
    }

    /// Register an upgrade listener; returns the stored handle.
    pub fn on_upgrade(&self, listener: impl UpgradeListener + 'static) -> UpgradeListenerRef {
        let listener: UpgradeListenerRef = Arc::new(listener);
        self.upgrades.add(Arc::clone(&listener));
        listener
    }

    /// Registered request listeners, in registration order.
    pub fn request_listeners(&self) -> Arc<Vec<RequestListenerRef>> {
        self.requests.snapshot()
    }

    /// Registered upgrade listeners, in registration order.
    pub fn upgrade_listeners(&self) -> Arc<Vec<UpgradeListenerRef>> {
        self.upgrades.snapshot()
    }

    pub fn listener_count(&self, event: EventKind) -> usize {
        match event {
            EventKind::Request => self.requests.len(),
            EventKind::Upgrade => self.upgrades.len(),
        }
    }

    /// Whether a router is attached for `event`.
    pub fn is_spliced(&self, event: EventKind) -> bool {
        match event {
            EventKind::Request => self.requests.is_spliced(),
            EventKind::Upgrade => self.upgrades.is_spliced(),
        }
    }

    /// Deliver a request to every listener in order. Returns how many ran.
    pub fn emit_request(&self, req: &mut Request<Body>, res: &ResponseSink) -> usize {
        let listeners = self.requests.snapshot();
        for listener in listeners.iter() {
            listener.on_request(self, req, res);
        }
        listeners.len()
    }

    /// Deliver an upgrade to every listener in order. Returns how many ran.
    pub fn emit_upgrade(&self, req: &Request<Body>, socket: &UpgradeSocket, head: &Bytes) -> usize {
        let listeners = self.upgrades.snapshot();
        for listener in listeners.iter() {
            listener.on_upgrade(self, req, socket, head);
        }
        listeners.len()
    }

    pub(crate) fn request_registry(&self) -> &EventRegistry<dyn RequestListener> {
        &self.requests
    }

    pub(crate) fn upgrade_registry(&self) -> &EventRegistry<dyn UpgradeListener> {
        &self.upgrades
    }
}
