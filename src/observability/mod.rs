//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! routing / http::server
//!     → logging.rs (structured tracing events, request + connection IDs)
//!     → metrics.rs (dispatch and fallback counters)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
