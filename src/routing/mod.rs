//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request event (path, query, headers)
//!     → matcher.rs (prefix test)
//!     → Claimed: strip prefix, emit to sub-application request sink
//!     → Passthrough: caller replays original listeners
//!
//! Upgrade event (path, Upgrade header, socket, head)
//!     → matcher.rs (reserved prefix OR token OR predicate)
//!     → Claimed: emit unmodified to sub-application upgrade sink
//!     → Passthrough: caller replays original listeners
//! ```
//!
//! # Design Decisions
//! - Options compiled once at attach, immutable afterwards
//! - One static prefix, no patterns, no method dispatch
//! - First matching upgrade condition wins

pub mod forwarder;
pub mod matcher;
pub mod options;

pub use forwarder::{Dispatch, RouteForwarder, SubApplication};
pub use matcher::{Matcher, RewriteError};
pub use options::{RouteError, RouteOptions, DEFAULT_ROUTE, DEFAULT_UPGRADE_TOKEN};
