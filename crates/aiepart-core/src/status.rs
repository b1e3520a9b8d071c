//! Point-in-time partition status for report renderers.

use serde::{Deserialize, Serialize};

use crate::error::{PartitionError, Result};
use crate::partition::PartitionState;
use crate::types::{ImageId, PartitionId};

/// Snapshot of one partition's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStatus {
    /// Partition identifier.
    pub partition_id: PartitionId,
    /// Image currently loaded, if any.
    pub loaded_image: Option<ImageId>,
    /// Live references.
    pub reference_count: u32,
    /// Whether the provider handle is held.
    pub handle_held: bool,
    /// Whether a reset is pending confirmation.
    pub reset_in_progress: bool,
    /// Whether a reset watcher is outstanding.
    pub watcher_active: bool,
}

impl PartitionStatus {
    pub(crate) fn from_state(id: PartitionId, state: &PartitionState) -> Self {
        Self {
            partition_id: id,
            loaded_image: state.loaded_image,
            reference_count: state.reference_count,
            handle_held: state.handle.is_some(),
            reset_in_progress: state.reset_in_progress,
            watcher_active: state.watcher_active,
        }
    }

    /// Returns true if callers can acquire without waiting.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        !self.reset_in_progress
    }

    /// Serializes the status as JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PartitionError::Internal(format!("status serialization failed: {e}")))
    }
}
