//! Hub splice: mount a sub-application inside someone else's HTTP server.
//!
//! A [`HostServer`] is an event server: its runtime emits `request` and
//! `upgrade` events to listeners in registration order. [`attach`] captures
//! those listeners, installs a single replacement per event and forwards
//! matching traffic to a [`SubApplication`]:
//!
//! - requests whose path starts with the route prefix, with the prefix
//!   stripped (`/yeti/status?x=1` reaches the hub as `/status?x=1`)
//! - upgrades on a reserved path prefix or carrying the hub's protocol
//!   token in the `Upgrade` header
//!
//! Everything else is replayed to the captured listeners, in order, with
//! the same request, response sink or socket.
//!
//! ```
//! use std::sync::Arc;
//! use hub_splice::{attach, HostServer, RouteOptions};
//!
//! let host = Arc::new(HostServer::new("host"));
//! let hub = Arc::new(HostServer::new("hub"));
//!
//! let router = attach(&host, hub, RouteOptions::new("/app")).unwrap();
//! assert_eq!(router.route(), "/app");
//! assert!(attach(&host, Arc::new(HostServer::new("other")), RouteOptions::default()).is_err());
//! ```

// Core subsystems
pub mod routing;
pub mod server;
pub mod splice;

// Host runtime
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::SpliceConfig;
pub use http::{HttpServer, ResponseSink, ServiceListener, UpgradeSocket};
pub use lifecycle::Shutdown;
pub use routing::{Dispatch, RouteOptions, SubApplication};
pub use server::{EventKind, HostServer, RequestListener, UpgradeListener};
pub use splice::{attach, AttachError, AttachedRouter};
