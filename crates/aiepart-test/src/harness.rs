//! Partition manager test harness.
//!
//! Wires a [`PartitionManager`] to a [`ScriptedProvider`] and offers the
//! consistency checks the integration tests lean on.

use std::sync::Arc;
use std::time::Duration;

use aiepart_core::{
    ImageId, ManagerConfig, PartitionId, PartitionLease, PartitionManager, ResetPolicy,
};
use tokio::task::JoinHandle;

use crate::error::{Result, TestError};
use crate::fault::FaultConfig;
use crate::scripted::{Availability, ScriptedProvider};

/// Test harness for partition lifecycle testing.
#[derive(Debug)]
pub struct PartitionTestHarness {
    manager: Arc<PartitionManager>,
    provider: ScriptedProvider,
}

impl PartitionTestHarness {
    /// Creates a new test harness builder.
    #[must_use]
    pub fn builder() -> PartitionTestHarnessBuilder {
        PartitionTestHarnessBuilder::default()
    }

    /// Creates a harness with a 1ms poll interval and the default attempt bound.
    ///
    /// # Errors
    /// Returns an error if the manager rejects the configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Returns the manager under test.
    #[must_use]
    pub const fn manager(&self) -> &Arc<PartitionManager> {
        &self.manager
    }

    /// Returns the scripted provider.
    #[must_use]
    pub const fn provider(&self) -> &ScriptedProvider {
        &self.provider
    }

    /// Acquires `count` leases on one partition.
    ///
    /// # Errors
    /// Returns the first acquisition failure.
    pub async fn acquire_many(
        &self,
        partition: PartitionId,
        image: ImageId,
        count: usize,
    ) -> Result<Vec<PartitionLease>> {
        let mut leases = Vec::with_capacity(count);
        for _ in 0..count {
            leases.push(self.manager.acquire(partition, image).await?);
        }
        Ok(leases)
    }

    /// Spawns `count` concurrent acquisitions of one partition.
    #[must_use]
    pub fn spawn_acquirers(
        &self,
        partition: PartitionId,
        image: ImageId,
        count: usize,
    ) -> Vec<JoinHandle<aiepart_core::Result<PartitionLease>>> {
        (0..count)
            .map(|_| {
                let manager = Arc::clone(&self.manager);
                tokio::spawn(async move { manager.acquire(partition, image).await })
            })
            .collect()
    }

    /// Notifies a reset with scripted availability and waits for it to settle.
    ///
    /// # Errors
    /// Returns `ResetTimeout` (wrapped) if the watcher gave up.
    pub async fn reset_and_wait(
        &self,
        partition: PartitionId,
        availability: Availability,
    ) -> Result<()> {
        self.provider.set_availability(partition, availability);
        self.manager.notify_reset(partition).await;
        self.manager.wait_for_reset(partition).await?;
        Ok(())
    }

    /// Waits for a future to finish within `limit`.
    ///
    /// # Errors
    /// Returns `Timeout` if the limit elapses first.
    pub async fn within<F, T>(&self, limit: Duration, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TestError::Timeout(limit))
    }

    /// Checks that manager state and provider holdings agree.
    ///
    /// The manager holds a handle exactly while the reference count is
    /// positive, and the provider agrees that handle is outstanding.
    ///
    /// # Errors
    /// Returns `Assertion` describing the first disagreement.
    pub async fn assert_consistent(&self, partition: PartitionId) -> Result<()> {
        let Ok(status) = self.manager.status(partition).await else {
            if self.provider.holds(partition) {
                return Err(TestError::assertion(format!(
                    "{partition} unknown to the manager but held by the provider"
                )));
            }
            return Ok(());
        };

        let counted = status.reference_count > 0;
        if counted != status.handle_held {
            return Err(TestError::assertion(format!(
                "{partition}: reference_count={} but handle_held={}",
                status.reference_count, status.handle_held
            )));
        }
        if counted != self.provider.holds(partition) {
            return Err(TestError::assertion(format!(
                "{partition}: reference_count={} but provider holds={}",
                status.reference_count,
                self.provider.holds(partition)
            )));
        }
        if status.loaded_image.is_some() && !counted {
            return Err(TestError::assertion(format!(
                "{partition}: image loaded with no references"
            )));
        }
        Ok(())
    }
}

/// Builder for the test harness.
#[derive(Debug)]
pub struct PartitionTestHarnessBuilder {
    policy: ResetPolicy,
    release_on_drop: bool,
    faults: Option<FaultConfig>,
}

impl Default for PartitionTestHarnessBuilder {
    fn default() -> Self {
        Self {
            policy: ResetPolicy::new().with_poll_interval(Duration::from_millis(1)),
            release_on_drop: true,
            faults: None,
        }
    }
}

impl PartitionTestHarnessBuilder {
    /// Sets the reset poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.policy = self.policy.with_poll_interval(interval);
        self
    }

    /// Sets the reset attempt bound.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.policy = self.policy.with_max_attempts(attempts);
        self
    }

    /// Sets whether dropped leases are released in the background.
    #[must_use]
    pub const fn with_release_on_drop(mut self, enabled: bool) -> Self {
        self.release_on_drop = enabled;
        self
    }

    /// Enables fault injection on the provider.
    #[must_use]
    pub fn with_faults(mut self, config: FaultConfig) -> Self {
        self.faults = Some(config);
        self
    }

    /// Builds the test harness.
    ///
    /// # Errors
    /// Returns an error if the manager rejects the configuration.
    pub fn build(self) -> Result<PartitionTestHarness> {
        let provider = self
            .faults
            .map_or_else(ScriptedProvider::new, ScriptedProvider::with_faults);

        let config = ManagerConfig::new()
            .with_reset_policy(self.policy)
            .with_release_on_drop(self.release_on_drop);
        let manager = PartitionManager::new(provider.shared(), config)
            .map_err(|e| TestError::harness(format!("manager setup failed: {e}")))?;

        Ok(PartitionTestHarness {
            manager: Arc::new(manager),
            provider,
        })
    }
}
