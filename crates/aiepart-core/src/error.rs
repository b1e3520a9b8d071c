//! Error types for aiepart-core.
//!
//! Every failure is returned to the immediate caller; none of them take
//! the manager down.

use std::time::Duration;

use crate::provider::ProviderError;
use crate::types::{ImageId, PartitionId};

/// Result type alias for partition operations.
pub type Result<T> = std::result::Result<T, PartitionError>;

/// Error type for partition lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum PartitionError {
    /// The provider rejected the request. Not retried automatically.
    #[error("acquisition of {partition} failed: {source}")]
    AcquisitionFailed {
        /// Partition that was requested.
        partition: PartitionId,
        /// Provider failure.
        #[source]
        source: ProviderError,
    },

    /// The partition is held with a different image loaded.
    #[error("{partition} is held with image {loaded}, requested {requested}")]
    ImageMismatch {
        /// Partition that was requested.
        partition: PartitionId,
        /// Image currently loaded.
        loaded: ImageId,
        /// Image the caller asked for.
        requested: ImageId,
    },

    /// The reset watcher exhausted its attempt bound.
    #[error("reset of {partition} did not complete within {waited:?}")]
    ResetTimeout {
        /// Partition still marked as resetting.
        partition: PartitionId,
        /// Polling budget that was spent.
        waited: Duration,
    },

    /// Release without a matching acquire.
    #[error("invalid release of {0}: no outstanding reference")]
    InvalidRelease(PartitionId),

    /// Partition has never been acquired or reset.
    #[error("partition not found: {0}")]
    NotFound(PartitionId),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (should not occur in production).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PartitionError {
    /// Creates an acquisition failure.
    #[must_use]
    pub const fn acquisition(partition: PartitionId, source: ProviderError) -> Self {
        Self::AcquisitionFailed { partition, source }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the partition the error refers to, if any.
    #[must_use]
    pub const fn partition(&self) -> Option<PartitionId> {
        match self {
            Self::AcquisitionFailed { partition, .. }
            | Self::ImageMismatch { partition, .. }
            | Self::ResetTimeout { partition, .. } => Some(*partition),
            Self::InvalidRelease(id) | Self::NotFound(id) => Some(*id),
            Self::Config(_) | Self::Internal(_) => None,
        }
    }

    /// Returns true if the provider or an image conflict refused the acquisition.
    #[must_use]
    pub const fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            Self::AcquisitionFailed { .. } | Self::ImageMismatch { .. }
        )
    }

    /// Returns true if a later attempt may succeed without caller changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ResetTimeout { .. } => true,
            Self::AcquisitionFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}
