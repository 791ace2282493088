//! Host server model.
//!
//! # Data Flow
//! ```text
//! host runtime (http::server)
//!     → HostServer::emit_request / emit_upgrade
//!     → registry.rs snapshot (ordered listeners)
//!     → each listener called with the server as explicit context
//! ```
//!
//! # Design Decisions
//! - The server is an injected object, not a global: anything that can
//!   register and enumerate listeners can be spliced
//! - Listener order is registration order, always
//! - Emission is synchronous; listeners spawn their own async work

pub mod host;
pub mod listener;
pub mod registry;

pub use host::HostServer;
pub use listener::{
    EventKind, RequestListener, RequestListenerRef, UpgradeListener, UpgradeListenerRef,
};
pub use registry::{EventRegistry, RegistryError};
