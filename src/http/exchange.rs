//! In-flight exchange handles shared between listeners.
//!
//! # Responsibilities
//! - `ResponseSink`: one-shot slot a request listener answers through
//! - `UpgradeSocket`: the connection behind an upgrade event, taken by
//!   whichever listener performs the handshake
//!
//! # Design Decisions
//! - Both handles are cheap to clone and compare by identity, so every
//!   listener in a chain observes the very same sink/socket
//! - The first answer wins; later sends are reported, not panicked on
//! - Dropping every handle without answering closes the exchange, which
//!   the host runtime turns into a fallback response

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use hyper::upgrade::OnUpgrade;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Response side of a request event.
#[derive(Debug, Clone)]
pub struct ResponseSink {
    tx: Arc<Mutex<Option<oneshot::Sender<Response<Body>>>>>,
}

impl ResponseSink {
    /// Create a sink and the receiver the host runtime awaits.
    pub fn channel() -> (Self, oneshot::Receiver<Response<Body>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Send the response. Returns false if a response was already sent or
    /// the connection went away.
    pub fn send(&self, response: Response<Body>) -> bool {
        match lock(&self.tx).take() {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Whether a response has already been sent through this sink.
    pub fn is_sent(&self) -> bool {
        lock(&self.tx).is_none()
    }

    /// True if both handles refer to the same exchange.
    pub fn same_exchange(&self, other: &ResponseSink) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

/// Connection behind an upgrade event.
///
/// Exactly one listener may take ownership; the rest see `None`.
#[derive(Debug, Clone)]
pub struct UpgradeSocket {
    inner: Arc<Mutex<Option<PendingUpgrade>>>,
}

impl UpgradeSocket {
    pub fn new(handshake: ResponseSink, on_upgrade: OnUpgrade) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(PendingUpgrade {
                handshake,
                on_upgrade,
            }))),
        }
    }

    /// Whether the connection is still unclaimed.
    pub fn is_available(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// Take ownership of the connection.
    pub fn take(&self) -> Option<PendingUpgrade> {
        lock(&self.inner).take()
    }

    /// True if both handles refer to the same connection.
    pub fn same_socket(&self, other: &UpgradeSocket) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// An owned, not yet answered upgrade.
#[derive(Debug)]
pub struct PendingUpgrade {
    handshake: ResponseSink,
    on_upgrade: OnUpgrade,
}

impl PendingUpgrade {
    /// Answer the handshake and return the future resolving to the raw
    /// upgraded connection. The response should carry status 101 for the
    /// connection to actually switch.
    pub fn accept(self, response: Response<Body>) -> OnUpgrade {
        self.handshake.send(response);
        self.on_upgrade
    }

    /// Accept with a bare `101 Switching Protocols` naming `protocol`.
    ///
    /// Fails if `protocol` is not a valid header value; the exchange is then
    /// closed without a handshake.
    pub fn switching_protocols(self, protocol: &str) -> Result<OnUpgrade, axum::http::Error> {
        let response = Response::builder()
            .status(StatusCode::SWITCHING_PROTOCOLS)
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, protocol)
            .body(Body::empty())?;
        Ok(self.accept(response))
    }

    /// Refuse the upgrade with a plain status response.
    pub fn reject(self, status: StatusCode) {
        let response = Response::builder()
            .status(status)
            .body(Body::empty())
            .unwrap_or_default();
        self.handshake.send(response);
    }
}
