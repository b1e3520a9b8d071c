//! In-crate tests for the partition lifecycle.
//!
//! | Module | Covers |
//! |--------|--------|
//! | `lifecycle` | acquire / release, reference counting, leases, provider failures |
//! | `reset` | reset notification, watcher single-flight, timeouts, waiter cancellation |
//! | `properties` | reference-count invariant under random acquire/release sequences |


use std::sync::Arc;
use std::time::Duration;

use crate::config::{ManagerConfig, ResetPolicy};
use crate::manager::PartitionManager;
use crate::types::{ImageId, PartitionId};

pub use mocks::MockProvider;

/// Partition used by most tests.
pub const PART: PartitionId = PartitionId::new(0);

/// Image used by most tests.
pub const IMAGE: ImageId = ImageId::new(0x00c0_ffee);

/// Builds a manager over the mock with the given reset bound and a 1ms interval.
pub fn manager_with(provider: &MockProvider, max_attempts: u32) -> Arc<PartitionManager> {
    let config = ManagerConfig::new().with_reset_policy(
        ResetPolicy::new()
            .with_poll_interval(Duration::from_millis(1))
            .with_max_attempts(max_attempts),
    );
    Arc::new(PartitionManager::new(provider.shared(), config).expect("valid config"))
}
