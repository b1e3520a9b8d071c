//! aiepart: AI-Engine partition lifecycle management.
//!
//! Reference-counts AIE partition handles on behalf of independent callers,
//! releases them when the last caller is done, and holds callers back
//! while a partition's hardware is being reset.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use aiepart::prelude::*;
//!
//! # async fn run(provider: std::sync::Arc<dyn PartitionProvider>) -> aiepart::core::Result<()> {
//! let manager = PartitionManager::new(provider, ManagerConfig::default())?;
//!
//! let mut lease = manager.acquire(PartitionId::new(0), ImageId::new(0x1234)).await?;
//! println!("partition reference {}", lease.fd());
//! lease.release().await?;
//! # Ok(())
//! # }
//! ```

pub use aiepart_core as core;

/// Prelude module for common imports.
pub mod prelude {
    pub use aiepart_core::{
        ImageId, ManagerConfig, PartitionError, PartitionFd, PartitionHandle, PartitionId,
        PartitionLease, PartitionManager, PartitionProvider, PartitionRequest, PartitionStatus,
        ProviderError, ProviderResult, ResetPolicy,
    };
}
