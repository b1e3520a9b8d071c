//! Partition lifecycle manager.
//!
//! Owns the registry of partition entities for one driver instance and
//! exposes acquire / release / notify_reset to the surrounding runtime.
//! The registry lock only guards the map; each partition serializes its
//! own state, so callers on different partitions never contend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::RwLock;

use crate::config::ManagerConfig;
use crate::error::{PartitionError, Result};
use crate::lease::PartitionLease;
use crate::metrics::PartitionMetrics;
use crate::partition::PartitionSlot;
use crate::provider::PartitionProvider;
use crate::status::PartitionStatus;
use crate::types::{ImageId, PartitionId, PartitionRequest};

// =============================================================================
// Shared
// =============================================================================

/// Context shared by the manager, its watchers and outstanding leases.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) provider: Arc<dyn PartitionProvider>,
    pub(crate) config: ManagerConfig,
    pub(crate) metrics: PartitionMetrics,
    runtime: Option<Handle>,
}

impl Shared {
    /// Returns the configured runtime, or the current one.
    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    /// Spawns a background task on the configured runtime, or the current
    /// one. Returns false if neither exists.
    pub(crate) fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.runtime() {
            Some(handle) => {
                drop(handle.spawn(task));
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("dedicated_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// PartitionManager
// =============================================================================

/// Lifecycle manager for AIE partitions.
///
/// One instance per driver; pass it (usually in an `Arc`) to every caller
/// that needs partitions. Partition entities are created lazily on the
/// first `acquire` or `notify_reset` for an id.
#[derive(Debug)]
pub struct PartitionManager {
    shared: Arc<Shared>,
    partitions: RwLock<HashMap<PartitionId, Arc<PartitionSlot>>>,
}

impl PartitionManager {
    /// Creates a manager over the given provider.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(provider: Arc<dyn PartitionProvider>, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                provider,
                config,
                metrics: PartitionMetrics::new(),
                runtime: None,
            }),
            partitions: RwLock::new(HashMap::new()),
        })
    }

    /// Creates a manager with the default configuration.
    #[must_use]
    pub fn with_defaults(provider: Arc<dyn PartitionProvider>) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                config: ManagerConfig::default(),
                metrics: PartitionMetrics::new(),
                runtime: None,
            }),
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Runs reset watchers and drop-releases on a dedicated runtime.
    ///
    /// Without one, background tasks go to the runtime of the caller.
    #[must_use]
    pub fn with_runtime(self, runtime: Handle) -> Self {
        let mut shared = Arc::unwrap_or_clone(self.shared);
        shared.runtime = Some(runtime);
        Self {
            shared: Arc::new(shared),
            partitions: self.partitions,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Returns the lifecycle metrics.
    #[must_use]
    pub fn metrics(&self) -> &PartitionMetrics {
        &self.shared.metrics
    }

    /// Acquires a reference to a partition with the given image.
    ///
    /// Suspends while the partition is resetting.
    ///
    /// # Errors
    /// - `ResetTimeout` if the reset watcher gave up while the caller waited
    /// - `AcquisitionFailed` if the provider refused the request
    /// - `ImageMismatch` if the partition is held with a different image
    pub async fn acquire(&self, partition: PartitionId, image: ImageId) -> Result<PartitionLease> {
        self.acquire_with(PartitionRequest::new(partition, image))
            .await
    }

    /// Acquires a reference using a full request descriptor.
    ///
    /// # Errors
    /// See [`PartitionManager::acquire`].
    pub async fn acquire_with(&self, request: PartitionRequest) -> Result<PartitionLease> {
        loop {
            let slot = self.slot_or_insert(request).await;

            match slot.acquire(&self.shared, request).await {
                Ok(Some(lease)) => return Ok(lease),
                // Closed by a concurrent shutdown; look the id up again.
                Ok(None) => {
                    tracing::debug!(partition = %request.partition_id, "slot closed, retrying");
                }
                Err(e) => {
                    self.shared.metrics.record_acquisition_failure();
                    tracing::debug!(partition = %request.partition_id, error = %e, "acquire failed");
                    return Err(e);
                }
            }
        }
    }

    /// Drops one reference to a partition.
    ///
    /// Pairs with a lease detached through [`PartitionLease::into_raw`].
    ///
    /// # Errors
    /// Returns `InvalidRelease` if the partition has no outstanding reference.
    pub async fn release(&self, partition: PartitionId) -> Result<()> {
        let slot = self
            .slot(partition)
            .await
            .ok_or(PartitionError::InvalidRelease(partition))?;
        slot.release(&self.shared).await
    }

    /// Signals that the partition's hardware is being reset.
    ///
    /// Idempotent while the reset is pending. Schedules a reset watcher
    /// unless one is already outstanding; returns true if it did.
    pub async fn notify_reset(&self, partition: PartitionId) -> bool {
        loop {
            let slot = self
                .slot_or_insert(PartitionRequest::new(partition, ImageId::new(0)))
                .await;
            if let Some(scheduled) = slot.notify_reset(&self.shared).await {
                return scheduled;
            }
        }
    }

    /// Waits until no reset is pending on the partition.
    ///
    /// Returns immediately for partitions that were never reset.
    ///
    /// # Errors
    /// Returns `ResetTimeout` if the watcher gave up.
    pub async fn wait_for_reset(&self, partition: PartitionId) -> Result<()> {
        let Some(slot) = self.slot(partition).await else {
            return Ok(());
        };
        let guard = slot.lock_when_ready(&self.shared).await?;
        drop(guard);
        Ok(())
    }

    /// Returns the status of one partition.
    ///
    /// # Errors
    /// Returns `NotFound` if the partition was never used.
    pub async fn status(&self, partition: PartitionId) -> Result<PartitionStatus> {
        let slot = self
            .slot(partition)
            .await
            .ok_or(PartitionError::NotFound(partition))?;
        Ok(slot.status().await)
    }

    /// Returns the status of every known partition, ordered by id.
    pub async fn snapshot(&self) -> Vec<PartitionStatus> {
        let slots: Vec<_> = self.partitions.read().await.values().cloned().collect();

        let mut statuses = Vec::with_capacity(slots.len());
        for slot in slots {
            statuses.push(slot.status().await);
        }
        statuses.sort_by_key(|s| s.partition_id);
        statuses
    }

    /// Returns the reference count of a partition (0 if unknown).
    pub async fn reference_count(&self, partition: PartitionId) -> u32 {
        self.status(partition)
            .await
            .map(|s| s.reference_count)
            .unwrap_or(0)
    }

    /// Returns true if a reset is pending on the partition.
    pub async fn is_reset_in_progress(&self, partition: PartitionId) -> bool {
        self.status(partition)
            .await
            .map(|s| s.reset_in_progress)
            .unwrap_or(false)
    }

    /// Returns the number of known partitions.
    pub async fn count(&self) -> usize {
        self.partitions.read().await.len()
    }

    /// Returns all known partition ids.
    pub async fn list(&self) -> Vec<PartitionId> {
        self.partitions.read().await.keys().copied().collect()
    }

    /// Releases every held handle and forgets all partitions.
    ///
    /// Outstanding leases become stale; releasing them later fails with
    /// `InvalidRelease`. Running watchers finish on their own. An acquisition
    /// still waiting on a forgotten partition starts over on a fresh entry.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self.partitions.write().await.drain().map(|(_, s)| s).collect();

        for slot in &slots {
            let dropped = slot.force_release(&self.shared).await;
            if dropped > 0 {
                tracing::warn!(
                    partition = %slot.id(),
                    refs = dropped,
                    "shutdown with outstanding references"
                );
            }
        }

        tracing::info!(count = slots.len(), "partition manager shut down");
    }

    async fn slot(&self, partition: PartitionId) -> Option<Arc<PartitionSlot>> {
        self.partitions.read().await.get(&partition).cloned()
    }

    async fn slot_or_insert(&self, request: PartitionRequest) -> Arc<PartitionSlot> {
        if let Some(slot) = self.slot(request.partition_id).await {
            return slot;
        }

        let mut partitions = self.partitions.write().await;
        Arc::clone(partitions.entry(request.partition_id).or_insert_with(|| {
            tracing::debug!(partition = %request.partition_id, "partition registered");
            Arc::new(PartitionSlot::new(request))
        }))
    }
}
