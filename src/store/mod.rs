//! Persistence-layer handle.
//!
//! # Responsibilities
//! - Own the process-wide store handle and its user table
//! - Expose the single `disconnect()` the shutdown orchestrator calls
//!
//! # Design Decisions
//! - In-memory table behind the handle; the shutdown core never interprets
//!   store internals, only connects, pings and disconnects
//! - `disconnect()` is released exactly once by the orchestrator; a second
//!   call reports `Disconnected` and the caller downgrades it to a warning

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for store operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The handle has already been released.
    #[error("store handle is disconnected")]
    Disconnected,
}

/// A stored user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Payload for creating a user.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Handle to the service's dependent resource.
///
/// Held behind an `Arc`; the orchestrator releases it once during Closing.
#[derive(Debug)]
pub struct Store {
    users: DashMap<Uuid, User>,
    connected: AtomicBool,
}

impl Store {
    /// Open the store handle.
    pub fn connect() -> Self {
        tracing::info!("Store connected");
        Self {
            users: DashMap::new(),
            connected: AtomicBool::new(true),
        }
    }

    /// Cheap connectivity check, used by the readiness probe.
    pub fn ping(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    /// Release the handle. Invoked once by the orchestrator during Closing;
    /// a repeat call fails with [`StoreError::Disconnected`].
    pub async fn disconnect(&self) -> Result<(), StoreError> {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::info!("Store disconnected");
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }

    /// Insert a new user record.
    pub fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        self.ping()?;
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// List all user records.
    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.ping()?;
        Ok(self.users.iter().map(|e| e.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_releases_once() {
        let store = Store::connect();
        assert!(store.ping().is_ok());

        store.disconnect().await.unwrap();
        assert_eq!(store.ping(), Err(StoreError::Disconnected));
        assert_eq!(store.disconnect().await, Err(StoreError::Disconnected));
    }

    #[tokio::test]
    async fn operations_fail_after_disconnect() {
        let store = Store::connect();
        let created = store
            .insert_user(NewUser {
                name: "ada".into(),
                email: "ada@example.com".into(),
            })
            .unwrap();
        assert_eq!(store.list_users().unwrap(), vec![created]);

        store.disconnect().await.unwrap();
        assert_eq!(store.list_users(), Err(StoreError::Disconnected));
    }
}
