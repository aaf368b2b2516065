//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Configure log level from the environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via RUST_LOG, with a service-scoped default

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for the binary.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
