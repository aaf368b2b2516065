//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → ServiceConfig (immutable)
//!     → shared with all subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no reload path
//! - All fields have defaults to allow minimal configs
//! - Durations are stored as plain integers and converted at the call site

pub mod loader;
pub mod schema;

pub use loader::{load_config, ConfigError};
pub use schema::{ListenerConfig, ServiceConfig, ShutdownConfig};
