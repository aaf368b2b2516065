//! User Service
//!
//! An HTTP service scaffold built with Tokio and Axum whose core is the
//! shutdown and request-drain coordinator.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request ──▶ http::server (accept loop) ──▶ middleware
//!                             │                            │
//!                             │            request ID → admission gate → tracker
//!                             ▼                            │
//!                     lifecycle::registry                  ▼
//!                     (live connections)           handlers (+ store)
//!
//!     SIGINT/SIGTERM ──▶ lifecycle::signals ──▶ lifecycle::shutdown
//!                                               Running → Draining → Closing → Terminated
//!                                               (drain counter, nudge/destroy
//!                                                connections, release store)
//! ```
//!
//! Every inbound request passes the admission gate and is wrapped by the
//! request counter. The first termination signal starts the graceful
//! sequence; a second signal or the overall deadline escalates to a forced
//! exit with a non-zero code.

// Core subsystems
pub mod config;
pub mod http;
pub mod store;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::{Orchestrator, Shutdown, ShutdownOutcome, ShutdownState};
