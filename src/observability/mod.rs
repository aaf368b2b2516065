//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Whatever metrics recorder the binary installs
//! ```
//!
//! # Design Decisions
//! - Structured logging via tracing; level configurable through RUST_LOG
//! - Metrics are cheap (atomic increments); no exporter is wired here

pub mod logging;
pub mod metrics;
