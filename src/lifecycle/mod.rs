//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build host + hub → Attach → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Stop accepting → Drain connections → Detach → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error, including a refused attach, is fatal
//! - Shutdown has a deadline: connections still open after it are dropped

pub mod shutdown;

pub use shutdown::Shutdown;
