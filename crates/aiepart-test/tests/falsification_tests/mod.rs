//! Falsification tests for aiepart.
//!
//! | Module | Claims |
//! |--------|--------|
//! | `refcount` | F001-F009: reference counting and handle ownership |
//! | `reset` | F010-F019: reset notification and bounded watching |
//! | `faults` | F020-F028: behavior under provider faults and abandoned calls |

// Allow test-specific patterns that are denied in production code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod refcount;
mod reset;

use aiepart_core::{ImageId, PartitionId};

/// Partition most claims are attacked on.
pub const PART: PartitionId = PartitionId::new(0);

/// A second partition for isolation claims.
pub const OTHER: PartitionId = PartitionId::new(1);

/// Default image.
pub const IMAGE: ImageId = ImageId::new(0x0001_a1e0);
