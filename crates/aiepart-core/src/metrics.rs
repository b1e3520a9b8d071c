//! Partition lifecycle counters.
//!
//! Shared by the manager, its watchers and outstanding leases; every
//! counter is a relaxed atomic, so a snapshot is consistent per field
//! but not across fields.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lifecycle metrics for all partitions of one manager.
#[derive(Debug, Clone)]
pub struct PartitionMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    // Acquire / release
    acquisitions: AtomicU64,
    acquisition_failures: AtomicU64,
    releases: AtomicU64,
    provider_requests: AtomicU64,
    provider_releases: AtomicU64,
    provider_release_failures: AtomicU64,

    // Reset handling
    resets_notified: AtomicU64,
    watchers_started: AtomicU64,
    resets_completed: AtomicU64,
    reset_timeouts: AtomicU64,
    availability_polls: AtomicU64,

    // Time callers spent suspended on a reset (microseconds)
    reset_wait_sum_us: AtomicU64,
    reset_wait_count: AtomicU64,
    reset_wait_max_us: AtomicU64,
}

impl PartitionMetrics {
    /// Creates an empty metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Acquire / release
    // ═══════════════════════════════════════════════════════════════════════════

    /// Records a successful acquisition.
    pub fn record_acquisition(&self) {
        self.inner.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns successful acquisitions.
    #[must_use]
    pub fn acquisitions(&self) -> u64 {
        self.inner.acquisitions.load(Ordering::Relaxed)
    }

    /// Records a failed acquisition (any error).
    pub fn record_acquisition_failure(&self) {
        self.inner
            .acquisition_failures
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Returns failed acquisitions.
    #[must_use]
    pub fn acquisition_failures(&self) -> u64 {
        self.inner.acquisition_failures.load(Ordering::Relaxed)
    }

    /// Records a successful release.
    pub fn record_release(&self) {
        self.inner.releases.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns successful releases.
    #[must_use]
    pub fn releases(&self) -> u64 {
        self.inner.releases.load(Ordering::Relaxed)
    }

    /// Records a call to the provider's `request`.
    pub fn record_provider_request(&self) {
        self.inner.provider_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns provider `request` calls.
    #[must_use]
    pub fn provider_requests(&self) -> u64 {
        self.inner.provider_requests.load(Ordering::Relaxed)
    }

    /// Records a call to the provider's `release`, and whether it failed.
    pub fn record_provider_release(&self, failed: bool) {
        self.inner.provider_releases.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.inner
                .provider_release_failures
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns provider `release` calls.
    #[must_use]
    pub fn provider_releases(&self) -> u64 {
        self.inner.provider_releases.load(Ordering::Relaxed)
    }

    /// Returns provider `release` calls that failed.
    #[must_use]
    pub fn provider_release_failures(&self) -> u64 {
        self.inner.provider_release_failures.load(Ordering::Relaxed)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Reset handling
    // ═══════════════════════════════════════════════════════════════════════════

    /// Records a reset notification.
    pub fn record_reset_notified(&self) {
        self.inner.resets_notified.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns reset notifications.
    #[must_use]
    pub fn resets_notified(&self) -> u64 {
        self.inner.resets_notified.load(Ordering::Relaxed)
    }

    /// Records a watcher being scheduled.
    pub fn record_watcher_started(&self) {
        self.inner.watchers_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns scheduled watchers.
    #[must_use]
    pub fn watchers_started(&self) -> u64 {
        self.inner.watchers_started.load(Ordering::Relaxed)
    }

    /// Records a watcher that saw the partition become available.
    pub fn record_reset_completed(&self) {
        self.inner.resets_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns completed resets.
    #[must_use]
    pub fn resets_completed(&self) -> u64 {
        self.inner.resets_completed.load(Ordering::Relaxed)
    }

    /// Records a watcher that exhausted its attempt bound.
    pub fn record_reset_timeout(&self) {
        self.inner.reset_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns timed-out resets.
    #[must_use]
    pub fn reset_timeouts(&self) -> u64 {
        self.inner.reset_timeouts.load(Ordering::Relaxed)
    }

    /// Records one availability poll.
    pub fn record_availability_poll(&self) {
        self.inner
            .availability_polls
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Returns availability polls across all watchers.
    #[must_use]
    pub fn availability_polls(&self) -> u64 {
        self.inner.availability_polls.load(Ordering::Relaxed)
    }

    /// Records how long a caller was suspended on a reset.
    pub fn record_reset_wait(&self, waited: Duration) {
        let us = waited.as_micros() as u64;
        self.inner.reset_wait_sum_us.fetch_add(us, Ordering::Relaxed);
        self.inner.reset_wait_count.fetch_add(1, Ordering::Relaxed);
        self.inner.reset_wait_max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Returns the average reset wait.
    #[must_use]
    pub fn reset_wait_avg(&self) -> Duration {
        let count = self.inner.reset_wait_count.load(Ordering::Relaxed);
        if count > 0 {
            let sum_us = self.inner.reset_wait_sum_us.load(Ordering::Relaxed);
            Duration::from_micros(sum_us / count)
        } else {
            Duration::ZERO
        }
    }

    /// Returns the longest reset wait.
    #[must_use]
    pub fn reset_wait_max(&self) -> Duration {
        Duration::from_micros(self.inner.reset_wait_max_us.load(Ordering::Relaxed))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Snapshot
    // ═══════════════════════════════════════════════════════════════════════════

    /// Creates a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            acquisitions: self.acquisitions(),
            acquisition_failures: self.acquisition_failures(),
            releases: self.releases(),
            provider_requests: self.provider_requests(),
            provider_releases: self.provider_releases(),
            provider_release_failures: self.provider_release_failures(),
            resets_notified: self.resets_notified(),
            watchers_started: self.watchers_started(),
            resets_completed: self.resets_completed(),
            reset_timeouts: self.reset_timeouts(),
            availability_polls: self.availability_polls(),
            reset_wait_avg_us: self.reset_wait_avg().as_micros() as u64,
            reset_wait_max_us: self.reset_wait_max().as_micros() as u64,
        }
    }
}

impl Default for PartitionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of lifecycle metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successful acquisitions.
    pub acquisitions: u64,
    /// Failed acquisitions.
    pub acquisition_failures: u64,
    /// Successful releases.
    pub releases: u64,
    /// Provider `request` calls.
    pub provider_requests: u64,
    /// Provider `release` calls.
    pub provider_releases: u64,
    /// Provider `release` calls that failed.
    pub provider_release_failures: u64,
    /// Reset notifications.
    pub resets_notified: u64,
    /// Watchers scheduled.
    pub watchers_started: u64,
    /// Watchers that saw the partition come back.
    pub resets_completed: u64,
    /// Watchers that gave up.
    pub reset_timeouts: u64,
    /// Availability polls.
    pub availability_polls: u64,
    /// Average reset wait in microseconds.
    pub reset_wait_avg_us: u64,
    /// Longest reset wait in microseconds.
    pub reset_wait_max_us: u64,
}
