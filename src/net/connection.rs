//! Live-connection accounting for the host runtime.
//!
//! Each accepted connection holds a [`ConnectionGuard`]; the tracker
//! publishes the live count on a watch channel so shutdown can wait for it
//! to reach zero without polling.
//!
//! Upgraded connections leave the tracker as soon as hyper hands the raw
//! IO to a listener. What the listener does with it afterwards is its own
//! business.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, used as a tracing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections currently being served.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    live: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (live, _) = watch::channel(0);
        Self {
            live: Arc::new(live),
        }
    }

    /// Register a connection; it stays counted until the guard drops.
    pub fn track(&self) -> ConnectionGuard {
        self.live.send_modify(|n| *n += 1);
        ConnectionGuard {
            live: Arc::clone(&self.live),
            id: ConnectionId::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.live.borrow()
    }

    /// Wait for the live count to reach zero. Returns false if `deadline`
    /// passed first.
    pub async fn wait_for_drain(&self, deadline: Duration) -> bool {
        let mut rx = self.live.subscribe();
        let drained = matches!(
            tokio::time::timeout(deadline, rx.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        drained
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one connection counted.
#[derive(Debug)]
pub struct ConnectionGuard {
    live: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
