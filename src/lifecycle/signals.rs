//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate every occurrence into a termination trigger event
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Signals are forwarded onto a channel rather than acted on here; the
//!   orchestrator decides what a first or repeated trigger means

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// An OS-level request to stop the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// Interactive interrupt (SIGINT / ctrl-c).
    Interrupt,
    /// Polite terminate (SIGTERM).
    Terminate,
}

impl std::fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Spawn the task that forwards SIGINT and SIGTERM onto `triggers`.
///
/// Every occurrence is forwarded, so an operator re-sending the signal
/// reaches the orchestrator's escalation path.
pub fn spawn_listener(triggers: mpsc::Sender<TerminationSignal>) -> JoinHandle<()> {
    tokio::spawn(async move {
        forward_signals(triggers).await;
    })
}

#[cfg(unix)]
async fn forward_signals(triggers: mpsc::Sender<TerminationSignal>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGINT handler");
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGTERM handler");
            return;
        }
    };

    loop {
        let sig = tokio::select! {
            _ = interrupt.recv() => TerminationSignal::Interrupt,
            _ = terminate.recv() => TerminationSignal::Terminate,
        };
        tracing::debug!(signal = %sig, "Termination signal received");
        if triggers.send(sig).await.is_err() {
            // Orchestrator has finished; nothing left to notify.
            return;
        }
    }
}

#[cfg(not(unix))]
async fn forward_signals(triggers: mpsc::Sender<TerminationSignal>) {
    loop {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if triggers.send(TerminationSignal::Interrupt).await.is_err() {
            return;
        }
    }
}
