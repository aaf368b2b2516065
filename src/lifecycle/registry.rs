//! Live transport-connection registry.
//!
//! # Responsibilities
//! - Track every open connection so shutdown can reach it
//! - Nudge connections to finish their current exchange and close
//! - Forcibly destroy whatever is left on the escalation path
//!
//! # Design Decisions
//! - Self-cleaning: a guard removes the entry when the connection task ends,
//!   so the set holds exactly the connections that are open
//! - Signals travel over per-connection watch channels; delivery is
//!   best-effort against handles that may already be gone

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// Connection id allocator. Relaxed ordering is enough; only uniqueness
/// matters, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Receivers handed to a connection task at registration time.
///
/// `graceful` changes when the connection should finish its current exchange
/// and close; `forced` changes when it must terminate immediately.
#[derive(Debug)]
pub struct ConnectionSignals {
    pub graceful: watch::Receiver<bool>,
    pub forced: watch::Receiver<bool>,
}

#[derive(Debug)]
struct ConnectionHandle {
    graceful: watch::Sender<bool>,
    forced: watch::Sender<bool>,
}

/// Tracks live connections for shutdown coordination.
///
/// Cloning shares the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. The returned guard removes it again when dropped
    /// (at the end of the connection task), keeping the set self-cleaning.
    pub fn register(&self) -> (ConnectionId, ConnectionSignals, RegistrationGuard) {
        let id = ConnectionId::next();
        let (graceful_tx, graceful_rx) = watch::channel(false);
        let (forced_tx, forced_rx) = watch::channel(false);
        self.connections.insert(
            id,
            ConnectionHandle {
                graceful: graceful_tx,
                forced: forced_tx,
            },
        );
        tracing::trace!(connection_id = %id, open = self.len(), "Connection registered");
        (
            id,
            ConnectionSignals {
                graceful: graceful_rx,
                forced: forced_rx,
            },
            RegistrationGuard {
                connections: Arc::clone(&self.connections),
                id,
            },
        )
    }

    /// Ask every registered connection to finish its current exchange and
    /// close. A graceful nudge, aimed at idle keep-alive connections.
    pub fn request_close_all(&self) {
        for entry in self.connections.iter() {
            // Send failure means the task already went away; nothing to do.
            let _ = entry.value().graceful.send(true);
        }
        tracing::debug!(open = self.len(), "Requested close on all connections");
    }

    /// Immediately terminate every remaining connection. Escalation path
    /// only: second termination signal or overall-deadline expiry.
    pub fn destroy_all(&self) {
        for entry in self.connections.iter() {
            let _ = entry.value().forced.send(true);
        }
        tracing::debug!(open = self.len(), "Destroyed all remaining connections");
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Removes a connection from the registry when its task ends.
#[derive(Debug)]
pub struct RegistrationGuard {
    connections: Arc<DashMap<ConnectionId, ConnectionHandle>>,
    id: ConnectionId,
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        // Tolerates double-removal: remove on an absent key is a no-op.
        self.connections.remove(&self.id);
        tracing::trace!(connection_id = %self.id, "Connection deregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_follows_guard_lifetime() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());

        let (id1, _sig1, guard1) = registry.register();
        let (id2, _sig2, guard2) = registry.register();
        assert_ne!(id1, id2);
        assert_eq!(registry.len(), 2);

        drop(guard1);
        assert_eq!(registry.len(), 1);
        drop(guard2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn request_close_reaches_registered_connections() {
        let registry = ConnectionRegistry::new();
        let (_id, mut signals, _guard) = registry.register();

        assert!(!*signals.graceful.borrow());
        registry.request_close_all();
        signals.graceful.changed().await.unwrap();
        assert!(*signals.graceful.borrow());
        // Forced channel untouched by the graceful nudge.
        assert!(!*signals.forced.borrow());
    }

    #[tokio::test]
    async fn destroy_reaches_registered_connections() {
        let registry = ConnectionRegistry::new();
        let (_id, mut signals, _guard) = registry.register();

        registry.destroy_all();
        signals.forced.changed().await.unwrap();
        assert!(*signals.forced.borrow());
    }

    #[test]
    fn signaling_after_connection_gone_is_best_effort() {
        let registry = ConnectionRegistry::new();
        let (_id, signals, guard) = registry.register();
        drop(signals);
        drop(guard);

        // Both paths must tolerate already-closed handles.
        registry.request_close_all();
        registry.destroy_all();
        assert!(registry.is_empty());
    }
}
