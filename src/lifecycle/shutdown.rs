//! Shutdown orchestration.
//!
//! # State Machine
//! ```text
//! Running ──trigger──▶ Draining ──drain done/timeout──▶ Closing ──listener+store released──▶ Terminated
//!                         │                                │
//!                         └── second trigger / overall ────┴──▶ forced: destroy connections, non-zero exit
//! ```
//!
//! # Design Decisions
//! - Termination triggers arrive as explicit events on a channel; the state
//!   machine never touches OS signals and stays unit-testable
//! - State is published on a watch channel for the gate, the listener loop
//!   and the readiness probe
//! - Every teardown failure during shutdown is absorbed with a warning;
//!   the process must terminate within the overall deadline regardless
//! - The orchestrator returns an outcome; only `main` exits the process

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::ShutdownConfig;
use crate::lifecycle::drain::wait_for_drain;
use crate::lifecycle::registry::ConnectionRegistry;
use crate::lifecycle::requests::RequestCounter;
use crate::lifecycle::signals::TerminationSignal;
use crate::observability::metrics;
use crate::store::Store;

/// Lifecycle phase of the process. Strictly forward-moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShutdownState {
    /// Serving traffic normally.
    Running,
    /// Shutdown begun: no new admissions, waiting for in-flight requests.
    Draining,
    /// Drain finished (or timed out): releasing listener and store.
    Closing,
    /// Shutdown complete. Terminal.
    Terminated,
}

/// Shared handle to the published shutdown state.
///
/// This is the flag the admission gate reads on every request, generalized
/// to the full phase so the listener loop and readiness probe can observe
/// transitions too. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    state: Arc<watch::Sender<ShutdownState>>,
}

impl Shutdown {
    /// Create a new handle in the `Running` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ShutdownState::Running);
        Self { state: Arc::new(tx) }
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Whether shutdown has begun. The admission gate's check.
    pub fn is_shutting_down(&self) -> bool {
        self.state() != ShutdownState::Running
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Advance to `next`. The state only ever moves forward; a stale or
    /// repeated advance is a no-op, which makes re-entrant triggers safe.
    pub(crate) fn advance(&self, next: ShutdownState) {
        self.state.send_if_modified(|current| {
            if next > *current {
                tracing::debug!(from = ?*current, to = ?next, "Shutdown state advanced");
                *current = next;
                true
            } else {
                false
            }
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// How the process ended up exiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Reached `Terminated` through the full graceful sequence.
    Clean,
    /// Escalated: repeated signal or overall-deadline expiry.
    Forced {
        /// Requests still in flight when the escalation fired.
        active_requests: u64,
    },
}

impl ShutdownOutcome {
    /// Process exit code: 0 for clean, non-zero for any escalation.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::Forced { .. } => 1,
        }
    }
}

/// Sequences the shutdown: stop admitting, nudge connections, wait for
/// drain, release the listener and the store, report the outcome.
pub struct Orchestrator {
    shutdown: Shutdown,
    requests: RequestCounter,
    registry: ConnectionRegistry,
    store: Arc<Store>,
    config: ShutdownConfig,
}

impl Orchestrator {
    pub fn new(
        shutdown: Shutdown,
        requests: RequestCounter,
        registry: ConnectionRegistry,
        store: Arc<Store>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            shutdown,
            requests,
            registry,
            store,
            config,
        }
    }

    /// Drive the state machine to completion.
    ///
    /// Blocks until the first trigger arrives on `triggers`, runs the
    /// graceful sequence, and races it against a second trigger and the
    /// overall deadline. `listener_closed` is the accept loop's ack that the
    /// listening socket is gone.
    pub async fn run(
        self,
        mut triggers: mpsc::Receiver<TerminationSignal>,
        listener_closed: oneshot::Receiver<()>,
    ) -> ShutdownOutcome {
        let Some(signal) = triggers.recv().await else {
            // Every trigger source hung up without firing; nothing left to
            // wait for, so finish cleanly.
            tracing::warn!("Trigger channel closed without a termination signal");
            return self.finish_clean();
        };

        tracing::info!(
            signal = %signal,
            active_requests = self.requests.current(),
            open_connections = self.registry.len(),
            "Shutdown requested, draining in-flight requests"
        );
        metrics::record_shutdown_started();

        self.shutdown.advance(ShutdownState::Draining);
        self.registry.request_close_all();

        // Independent of the drain deadline: bounds total shutdown
        // wall-clock time, including resource teardown.
        let overall_deadline = tokio::time::sleep(self.config.overall_deadline());
        tokio::pin!(overall_deadline);

        let graceful = self.graceful_sequence(listener_closed);
        tokio::pin!(graceful);

        tokio::select! {
            () = &mut graceful => self.finish_clean(),
            Some(signal) = triggers.recv() => {
                self.force(&format!("repeated termination signal ({signal})"))
            }
            () = &mut overall_deadline => {
                self.force("overall shutdown deadline elapsed")
            }
        }
    }

    /// Draining then Closing, with every failure absorbed.
    async fn graceful_sequence(&self, listener_closed: oneshot::Receiver<()>) {
        match wait_for_drain(
            &self.requests,
            self.config.drain_timeout(),
            self.config.drain_poll_interval(),
        )
        .await
        {
            Ok(()) => tracing::info!("All in-flight requests drained"),
            // A slow client must not block shutdown once connections have
            // been nudged; abandoned requests are cut off on process exit.
            Err(e) => tracing::warn!(error = %e, "Drain deadline elapsed, closing anyway"),
        }

        self.shutdown.advance(ShutdownState::Closing);

        match tokio::time::timeout(self.config.listener_close_grace(), listener_closed).await {
            Ok(Ok(())) => tracing::info!("Listener closed"),
            Ok(Err(_)) | Err(_) => {
                tracing::warn!("Listener did not confirm close within the grace window");
            }
        }

        if let Err(e) = self.store.disconnect().await {
            tracing::warn!(error = %e, "Failed to release store handle");
        }
    }

    fn finish_clean(&self) -> ShutdownOutcome {
        self.shutdown.advance(ShutdownState::Terminated);
        metrics::record_shutdown_completed(false);
        tracing::info!("Graceful shutdown complete");
        ShutdownOutcome::Clean
    }

    fn force(&self, reason: &str) -> ShutdownOutcome {
        let active_requests = self.requests.current();
        tracing::warn!(
            reason,
            active_requests,
            open_connections = self.registry.len(),
            "Forced shutdown, destroying live connections"
        );
        self.registry.destroy_all();
        self.shutdown.advance(ShutdownState::Terminated);
        metrics::record_shutdown_completed(true);
        ShutdownOutcome::Forced { active_requests }
    }
}
