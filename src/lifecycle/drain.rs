//! Drain waiting: block until in-flight requests reach zero.
//!
//! # Design Decisions
//! - Cooperative polling at a fixed interval rather than notify-on-decrement:
//!   shutdown is rare and latency-insensitive, and the counter is cheap to
//!   sample
//! - Returns immediately, without sleeping, when the count is already zero

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::lifecycle::requests::RequestCounter;

/// Default interval between counter samples.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The drain deadline elapsed with requests still in flight.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("timed out waiting for in-flight requests to drain ({active} still active)")]
pub struct DrainTimeout {
    /// Requests still active when the deadline elapsed.
    pub active: u64,
}

/// Wait until `counter` reaches zero, sampling every `poll_interval`.
///
/// Fails with [`DrainTimeout`] once `deadline` has elapsed; the timeout
/// surfaces no earlier than the deadline and no later than one poll interval
/// past it. Only observes the counter; never blocks in-flight work.
pub async fn wait_for_drain(
    counter: &RequestCounter,
    deadline: Duration,
    poll_interval: Duration,
) -> Result<(), DrainTimeout> {
    let start = Instant::now();
    loop {
        let active = counter.current();
        if active == 0 {
            return Ok(());
        }
        if start.elapsed() >= deadline {
            return Err(DrainTimeout { active });
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_immediately_when_idle() {
        let counter = RequestCounter::new();
        let start = std::time::Instant::now();
        wait_for_drain(&counter, Duration::from_secs(5), DEFAULT_POLL_INTERVAL)
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_once_requests_complete() {
        let counter = RequestCounter::new();
        let guard = counter.enter();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            guard.settle();
        });

        let start = Instant::now();
        wait_for_drain(&counter, Duration::from_secs(5), DEFAULT_POLL_INTERVAL)
            .await
            .unwrap();
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(350));
        assert!(waited <= Duration::from_millis(350) + DEFAULT_POLL_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_one_poll_of_deadline() {
        let counter = RequestCounter::new();
        let _stuck = counter.enter();

        let deadline = Duration::from_secs(1);
        let start = Instant::now();
        let err = wait_for_drain(&counter, deadline, DEFAULT_POLL_INTERVAL)
            .await
            .unwrap_err();
        let waited = start.elapsed();

        assert_eq!(err, DrainTimeout { active: 1 });
        assert!(waited >= deadline);
        assert!(waited <= deadline + DEFAULT_POLL_INTERVAL);
    }
}
