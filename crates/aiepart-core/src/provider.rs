//! Partition handle provider abstraction.
//!
//! The provider is the platform layer that owns the hardware. The core
//! relies on exactly four capabilities and assumes nothing else about
//! how a provider works internally.

use async_trait::async_trait;

use crate::types::{PartitionFd, PartitionHandle, PartitionRequest};

// =============================================================================
// ProviderError
// =============================================================================

/// Error type for provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No such partition on this platform.
    #[error("partition not found")]
    NotFound,

    /// Partition is claimed by someone else or mid-reset.
    #[error("partition busy")]
    Busy,

    /// The handle is not (or no longer) valid.
    #[error("invalid partition handle")]
    InvalidHandle,

    /// Any other platform failure.
    #[error("platform error: {0}")]
    Platform(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Creates a platform error.
    #[must_use]
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Returns true if retrying the same request later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

// =============================================================================
// PartitionProvider
// =============================================================================

/// Platform capability used by the lifecycle manager.
///
/// Implementations must be safe to call from several tasks at once. The
/// manager never calls `request` twice for a partition without a `release`
/// in between, and never calls `get_reference` or `release` with a handle
/// it did not get from `request`.
#[async_trait]
pub trait PartitionProvider: Send + Sync + 'static {
    /// Requests a partition. Returns the handle on success.
    async fn request(&self, request: &PartitionRequest) -> ProviderResult<PartitionHandle>;

    /// Obtains a file-descriptor-like reference to an acquired partition.
    async fn get_reference(&self, handle: PartitionHandle) -> ProviderResult<PartitionFd>;

    /// Releases a partition back to the platform.
    async fn release(&self, handle: PartitionHandle) -> ProviderResult<()>;

    /// Returns true when the partition is usable (not mid-reset).
    async fn is_available(&self, request: &PartitionRequest) -> bool;
}

// =============================================================================
// UnsupportedProvider
// =============================================================================

/// Provider for platforms without AIE hardware.
///
/// Requests fail with `NotFound`, references are invalid, release is a
/// no-op and partitions are never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProvider;

impl UnsupportedProvider {
    /// Creates the provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PartitionProvider for UnsupportedProvider {
    async fn request(&self, request: &PartitionRequest) -> ProviderResult<PartitionHandle> {
        tracing::debug!(partition = %request.partition_id, "no AIE platform, request refused");
        Err(ProviderError::NotFound)
    }

    async fn get_reference(&self, _handle: PartitionHandle) -> ProviderResult<PartitionFd> {
        Err(ProviderError::InvalidHandle)
    }

    async fn release(&self, _handle: PartitionHandle) -> ProviderResult<()> {
        Ok(())
    }

    async fn is_available(&self, _request: &PartitionRequest) -> bool {
        false
    }
}
