//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address, timeouts).
    pub listener: ListenerConfig,

    /// Shutdown and drain settings.
    pub shutdown: ShutdownConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ListenerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replace the port of the bind address, keeping the host part.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or("0.0.0.0");
        self.bind_address = format!("{host}:{port}");
    }
}

/// Shutdown and drain settings.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long to wait for in-flight requests to finish.
    pub drain_timeout_secs: u64,

    /// Interval between drain-waiter samples of the request counter.
    pub drain_poll_ms: u64,

    /// Bound on total shutdown wall-clock time, teardown included.
    pub overall_deadline_secs: u64,

    /// Grace window for the listener to confirm it closed.
    pub listener_grace_ms: u64,

    /// `Retry-After` hint (seconds) on rejected requests.
    pub retry_after_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 25,
            drain_poll_ms: 100,
            overall_deadline_secs: 30,
            listener_grace_ms: 1_000,
            retry_after_secs: 5,
        }
    }
}

impl ShutdownConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_secs(self.overall_deadline_secs)
    }

    pub fn listener_close_grace(&self) -> Duration {
        Duration::from_millis(self.listener_grace_ms)
    }
}
