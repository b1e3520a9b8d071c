//! # aiepart-test
//!
//! Testing infrastructure for the aiepart partition lifecycle manager.
//!
//! This crate provides:
//! - **Scripted provider**: records every platform call, tracks held
//!   handles per partition and follows a per-partition availability script
//! - **Fault injection**: deterministic latency and failure budgets per
//!   provider operation
//! - **Test harness**: manager plus provider wiring with consistency checks
//! - **Falsification tests**: the lifecycle guarantees, each stated as a
//!   claim and attacked by a test
//!
//! ## Example
//!
//! ```rust,ignore
//! use aiepart_test::{Availability, PartitionTestHarness};
//!
//! let harness = PartitionTestHarness::builder()
//!     .with_max_attempts(5)
//!     .build()?;
//!
//! harness.reset_and_wait(part, Availability::AfterPolls(3)).await?;
//! harness.assert_consistent(part).await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fault;
pub mod harness;
pub mod scripted;

pub use error::{Result, TestError};
pub use fault::{FaultConfig, FaultInjector, FaultKind, Operation};
pub use harness::{PartitionTestHarness, PartitionTestHarnessBuilder};
pub use scripted::{Availability, ProviderCall, ScriptedProvider};
