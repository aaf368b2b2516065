//! Lifecycle management subsystem: the shutdown and request-drain core.
//!
//! # Data Flow
//! ```text
//! Request path (requests.rs):
//!     Admission → enter() → handler → settle() on finish or early close
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Draining (stop admitting, nudge connections, wait for drain)
//!             → Closing (stop listener, release store)
//!             → Terminated (exit 0)
//!     Second trigger / overall deadline → destroy connections, exit non-zero
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger event on the orchestrator's channel
//! ```
//!
//! # Design Decisions
//! - All shared state (counter, state flag, connection set) is owned by
//!   handles created at startup, never module statics
//! - Ordered shutdown: stop admitting, drain, close listener, release store
//! - Two independent deadlines: drain (per-phase) and overall (wall-clock)

pub mod drain;
pub mod registry;
pub mod requests;
pub mod shutdown;
pub mod signals;

pub use drain::{wait_for_drain, DrainTimeout, DEFAULT_POLL_INTERVAL};
pub use registry::{ConnectionId, ConnectionRegistry, ConnectionSignals};
pub use requests::{RequestCounter, RequestGuard};
pub use shutdown::{Orchestrator, Shutdown, ShutdownOutcome, ShutdownState};
pub use signals::TerminationSignal;
