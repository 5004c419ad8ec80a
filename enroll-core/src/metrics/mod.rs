//! Provisioning metrics
//!
//! Emitted through the `metrics` facade; installing a recorder/exporter is up
//! to the embedding application.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const PROVISION_ATTEMPTS: &str = "provision.attempts";
pub const PROVISION_ALREADY_PROVISIONED: &str = "provision.rejected.already_provisioned";
pub const PROVISION_KEYS_GENERATED: &str = "provision.keys.generated";
pub const PROVISION_PUSH_SUCCESS: &str = "provision.push.success";
pub const PROVISION_PUSH_FAILED: &str = "provision.push.failed";
pub const PROVISION_SNAPSHOT_REFRESHES: &str = "provision.snapshot.refreshes";
pub const PROVISION_SWAPS: &str = "provision.swaps";
pub const PROVISION_SWAP_FAILED: &str = "provision.swap.failed";
pub const PROVISION_SECRET_SYNC_FAILED: &str = "provision.secret_sync.failed";
pub const PROVISION_CANCELLED: &str = "provision.cancelled";
pub const PROVISION_PUSH_DURATION: &str = "provision.push.duration_ms";
pub const PROVISION_RUN_DURATION: &str = "provision.run.duration_ms";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(PROVISION_ATTEMPTS, "Number of provisioning runs started");
    describe_counter!(
        PROVISION_ALREADY_PROVISIONED,
        "Runs rejected because this install already has a device"
    );
    describe_counter!(PROVISION_KEYS_GENERATED, "Device key sets generated");
    describe_counter!(PROVISION_PUSH_SUCCESS, "Delegation pushes accepted by the identity service");
    describe_counter!(PROVISION_PUSH_FAILED, "Delegation pushes that failed");
    describe_counter!(PROVISION_SNAPSHOT_REFRESHES, "User snapshot reloads");
    describe_counter!(PROVISION_SWAPS, "Active device switches");
    describe_counter!(PROVISION_SWAP_FAILED, "Active device switches that failed");
    describe_counter!(PROVISION_SECRET_SYNC_FAILED, "Best-effort secret syncs that failed");
    describe_counter!(PROVISION_CANCELLED, "Provisioning steps aborted by cancellation");
    describe_histogram!(PROVISION_PUSH_DURATION, "Delegation push duration in milliseconds");
    describe_histogram!(PROVISION_RUN_DURATION, "Register + keygen duration in milliseconds");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a histogram metric
pub fn record_histogram(name: &'static str, value: f64) {
    histogram!(name).record(value);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    /// Create a new timer
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder() {
        init_metrics();
        record_counter(PROVISION_ATTEMPTS, 1);
        record_histogram(PROVISION_PUSH_DURATION, 1.5);
        Timer::new(PROVISION_RUN_DURATION).stop();
    }
}
