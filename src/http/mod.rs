//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper, HTTP/1.1 + HTTP/2, upgrades enabled)
//!     → request.rs (request ID, upgrade detection)
//!     → exchange.rs (ResponseSink / UpgradeSocket for the event)
//!     → HostServer::emit_request / emit_upgrade
//!     → a listener answers through the sink, or takes the socket
//! ```

pub mod exchange;
pub mod request;
pub mod server;
pub mod service;

pub use exchange::{PendingUpgrade, ResponseSink, UpgradeSocket};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
pub use service::ServiceListener;
