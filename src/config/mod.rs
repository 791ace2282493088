//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SpliceConfig (validated, immutable)
//!     → RouteOptions::from(&config.route) at attach
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the route cannot change after attach
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ListenerConfig, ObservabilityConfig, RouteConfig, SpliceConfig, TimeoutConfig};
pub use validation::{validate_config, ValidationError};
