//! Caller-held partition leases.
//!
//! A lease is the opaque token returned by a successful acquisition. It
//! owns exactly one reference: `release` gives it back once, a second call
//! fails with `InvalidRelease`. A lease dropped without release is given
//! back by a background task when the manager allows it, so early returns
//! and panics do not leak references.

use std::fmt;
use std::sync::Arc;

use crate::error::{PartitionError, Result};
use crate::manager::Shared;
use crate::partition::PartitionSlot;
use crate::types::{ImageId, LeaseId, PartitionFd, PartitionId};

/// One reference to an acquired partition.
pub struct PartitionLease {
    id: LeaseId,
    image_id: ImageId,
    fd: PartitionFd,
    slot: Arc<PartitionSlot>,
    shared: Arc<Shared>,
    released: bool,
}

impl PartitionLease {
    pub(crate) fn new(
        image_id: ImageId,
        fd: PartitionFd,
        slot: Arc<PartitionSlot>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id: LeaseId::new(),
            image_id,
            fd,
            slot,
            shared,
            released: false,
        }
    }

    /// Returns the lease ID.
    #[must_use]
    pub const fn id(&self) -> LeaseId {
        self.id
    }

    /// Returns the partition this lease references.
    #[must_use]
    pub fn partition_id(&self) -> PartitionId {
        self.slot.id()
    }

    /// Returns the image requested with this lease.
    #[must_use]
    pub const fn image_id(&self) -> ImageId {
        self.image_id
    }

    /// Returns the provider reference obtained for this lease.
    #[must_use]
    pub const fn fd(&self) -> PartitionFd {
        self.fd
    }

    /// Returns true once the reference has been given back.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Gives the reference back to the manager.
    ///
    /// # Errors
    /// Returns `InvalidRelease` if this lease was already released.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            return Err(PartitionError::InvalidRelease(self.slot.id()));
        }
        self.released = true;
        self.slot.release(&self.shared).await
    }

    /// Detaches the reference from this lease.
    ///
    /// The caller becomes responsible for a matching
    /// `PartitionManager::release` on the partition.
    #[must_use]
    pub fn into_raw(mut self) -> PartitionFd {
        self.released = true;
        self.fd
    }
}

impl fmt::Debug for PartitionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionLease")
            .field("id", &self.id)
            .field("partition_id", &self.slot.id())
            .field("image_id", &self.image_id)
            .field("fd", &self.fd)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for PartitionLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let partition = self.slot.id();
        if !self.shared.config.release_on_drop {
            tracing::warn!(partition = %partition, lease = %self.id, "lease dropped without release");
            return;
        }

        let slot = Arc::clone(&self.slot);
        let shared = Arc::clone(&self.shared);
        let lease = self.id;
        let scheduled = self.shared.spawn(async move {
            if let Err(e) = slot.release(&shared).await {
                tracing::debug!(partition = %partition, lease = %lease, error = %e, "drop release skipped");
            }
        });

        if !scheduled {
            tracing::warn!(
                partition = %partition,
                lease = %lease,
                "no runtime to release dropped lease, reference leaked"
            );
        }
    }
}
