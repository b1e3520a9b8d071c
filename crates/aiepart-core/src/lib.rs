// Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # aiepart-core
//!
//! Lifecycle management for AI-Engine (AIE) partitions.
//!
//! This crate provides:
//!
//! - [`PartitionProvider`], the four platform capabilities the core relies on
//! - [`PartitionManager`], which reference-counts partition handles on
//!   behalf of independent callers and releases them at zero
//! - a reset watcher that polls availability with a bounded budget after
//!   [`PartitionManager::notify_reset`], shared by every waiting caller
//! - [`PartitionLease`], the opaque token handed to callers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aiepart_core::{ImageId, ManagerConfig, PartitionId, PartitionManager};
//!
//! let manager = PartitionManager::new(Arc::new(my_provider), ManagerConfig::default())?;
//!
//! let mut lease = manager.acquire(PartitionId::new(0), ImageId::new(0x1234)).await?;
//! // ... use lease.fd() ...
//! lease.release().await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Allow significant_drop_tightening - overly aggressive for async code with locks
#![allow(clippy::significant_drop_tightening)]

pub mod config;
pub mod error;
pub mod lease;
pub mod manager;
pub mod metrics;
mod partition;
pub mod provider;
pub mod status;
#[cfg(test)]
pub mod tests;
pub mod types;
mod watcher;

pub use config::{
    DEFAULT_RESET_MAX_ATTEMPTS, DEFAULT_RESET_POLL_INTERVAL, ManagerConfig, ResetPolicy,
};
pub use error::{PartitionError, Result};
pub use lease::PartitionLease;
pub use manager::PartitionManager;
pub use metrics::{MetricsSnapshot, PartitionMetrics};
pub use provider::{PartitionProvider, ProviderError, ProviderResult, UnsupportedProvider};
pub use status::PartitionStatus;
pub use types::{
    ImageId, LeaseId, PartitionFd, PartitionHandle, PartitionId, PartitionRequest, ResetOutcome,
};
