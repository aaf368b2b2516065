//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, per-connection serving, registry wiring)
//!     → middleware.rs (request ID, admission gate, request tracking)
//!     → handlers.rs (probes, user routes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{AppState, HttpServer};
