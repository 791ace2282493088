//! Listener splicing.
//!
//! # Data Flow
//! ```text
//! attach(server, app, options)
//!     → claim request + upgrade registries (reject double attach)
//!     → capture ordered listener snapshots
//!     → install one replacement per event (compare-and-swap)
//!     → on failure: restore captured lists, release claims
//!
//! Per event:
//!     replacement → RouteForwarder decision
//!         → Claimed: done
//!         → Passthrough: replay captured listeners in order,
//!           passing the host server explicitly
//! ```
//!
//! # Design Decisions
//! - Exactly one router per server and event
//! - Captured lists are immutable; replay order is registration order
//! - Attach is all-or-nothing

pub mod splicer;

pub use splicer::{attach, AttachError, AttachedRouter};
