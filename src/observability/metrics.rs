//! Metrics collection.
//!
//! # Metrics
//! - `service_active_requests` (gauge): requests currently being handled
//! - `service_requests_rejected_total` (counter): admissions refused during shutdown
//! - `service_shutdowns_total` (counter): shutdowns by outcome
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Export format is the recorder's concern, not ours

use metrics::{counter, gauge};

/// A request was admitted and entered the counter.
pub fn record_request_started() {
    gauge!("service_active_requests").increment(1.0);
}

/// An admitted request settled (finished or was cut off).
pub fn record_request_settled() {
    gauge!("service_active_requests").decrement(1.0);
}

/// The admission gate refused a request during shutdown.
pub fn record_request_rejected() {
    counter!("service_requests_rejected_total").increment(1);
}

/// The first termination trigger arrived.
pub fn record_shutdown_started() {
    counter!("service_shutdowns_total", "phase" => "started").increment(1);
}

/// Shutdown reached its terminal state.
pub fn record_shutdown_completed(forced: bool) {
    let outcome = if forced { "forced" } else { "clean" };
    counter!("service_shutdowns_total", "outcome" => outcome).increment(1);
}
