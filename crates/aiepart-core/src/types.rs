//! Core types for partition lifecycle management.
//!
//! Partition and image identifiers are the platform's raw `u32` values,
//! wrapped so they cannot be mixed up. Leases get UUIDs so a released
//! lease is never confused with a later one for the same partition.

use serde::{Deserialize, Serialize};

/// Identifier of a physical AIE partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(u32);

impl PartitionId {
    /// Creates a partition ID from the platform's raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw platform value.
    #[must_use]
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PartitionId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for PartitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "part-{}", self.0)
    }
}

/// Identifier of an image loaded into a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(u32);

impl ImageId {
    /// Creates an image ID from the platform's raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw platform value.
    #[must_use]
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ImageId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Unique identifier for one lease handed to a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseId(uuid::Uuid);

impl LeaseId {
    /// Creates a new random lease ID.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for LeaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request descriptor handed to the provider.
///
/// Mirrors the platform's partition request: which partition, which
/// image, opaque metadata and request flags. The reset watcher polls
/// availability with the most recent descriptor used for a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRequest {
    /// Partition being requested.
    pub partition_id: PartitionId,
    /// Image the caller wants loaded.
    pub image_id: ImageId,
    /// Opaque platform metadata.
    #[serde(default)]
    pub meta_data: u64,
    /// Platform request flags.
    #[serde(default)]
    pub flags: u32,
}

impl PartitionRequest {
    /// Creates a request for the given partition and image.
    #[must_use]
    pub const fn new(partition_id: PartitionId, image_id: ImageId) -> Self {
        Self {
            partition_id,
            image_id,
            meta_data: 0,
            flags: 0,
        }
    }

    /// Sets the opaque metadata.
    #[must_use]
    pub const fn with_meta_data(mut self, meta_data: u64) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Sets the request flags.
    #[must_use]
    pub const fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }
}

/// Provider-side handle to an acquired partition.
///
/// Opaque to the manager; only the provider interprets the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionHandle(u64);

impl PartitionHandle {
    /// Wraps a provider-specific handle value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the provider-specific value.
    #[must_use]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

/// File-descriptor-like reference returned for each acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionFd(i32);

impl PartitionFd {
    /// Wraps a raw descriptor value.
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Returns the raw descriptor value.
    #[must_use]
    pub const fn as_raw(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for PartitionFd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fd:{}", self.0)
    }
}

/// How a reset watcher terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetOutcome {
    /// The provider reported the partition available again.
    Completed,
    /// The attempt bound was exhausted.
    TimedOut,
}

impl ResetOutcome {
    /// Returns true if the reset completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}
