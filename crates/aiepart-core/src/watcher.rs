//! Reset watcher: bounded availability polling after a partition reset.
//!
//! One watcher runs per partition at a time. It sleeps for the policy's
//! poll interval, asks the provider whether the partition is available,
//! and stops on the first positive answer or when the attempt bound is
//! spent. Waiters share its outcome through the partition's reset
//! channel, so the provider sees one poll loop no matter how many callers
//! are blocked. A watcher is never cancelled once scheduled.

use std::sync::Arc;

use crate::manager::Shared;
use crate::partition::PartitionSlot;
use crate::types::{PartitionRequest, ResetOutcome};

/// Deferred task bound to one partition.
pub(crate) struct ResetWatcher {
    slot: Arc<PartitionSlot>,
    shared: Arc<Shared>,
    request: PartitionRequest,
    generation: u64,
}

impl ResetWatcher {
    pub(crate) fn new(
        slot: Arc<PartitionSlot>,
        shared: Arc<Shared>,
        request: PartitionRequest,
        generation: u64,
    ) -> Self {
        Self {
            slot,
            shared,
            request,
            generation,
        }
    }

    /// Polls until the partition is available or the bound is reached.
    pub(crate) async fn run(self) {
        let outcome = self.poll().await;
        let partition = self.slot.id();

        match outcome {
            ResetOutcome::Completed => {
                self.shared.metrics.record_reset_completed();
                tracing::info!(partition = %partition, "partition reset completed");
            }
            ResetOutcome::TimedOut => {
                self.shared.metrics.record_reset_timeout();
                tracing::warn!(
                    partition = %partition,
                    budget = ?self.shared.config.reset.total_budget(),
                    "partition still unavailable after reset"
                );
            }
        }

        self.slot.finish_reset(self.generation, outcome).await;
    }

    async fn poll(&self) -> ResetOutcome {
        let policy = self.shared.config.reset;
        let mut attempts: u32 = 0;

        loop {
            tokio::time::sleep(policy.poll_interval).await;
            attempts += 1;
            self.shared.metrics.record_availability_poll();

            if self.shared.provider.is_available(&self.request).await {
                tracing::debug!(partition = %self.slot.id(), attempt = attempts, "partition available");
                return ResetOutcome::Completed;
            }

            tracing::debug!(partition = %self.slot.id(), attempt = attempts, "partition not yet available");

            if attempts >= policy.max_attempts {
                return ResetOutcome::TimedOut;
            }
        }
    }
}
