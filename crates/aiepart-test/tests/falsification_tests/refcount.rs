//! Falsification Tests: Category A - Reference Counting (F001-F009)
//!
//! Claims about who owns a partition handle and when it goes back to the
//! platform.

use std::time::Duration;

use aiepart_core::{ImageId, PartitionError};
use aiepart_test::{FaultConfig, PartitionTestHarness, ProviderCall};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use tokio::time::Instant;

use super::{IMAGE, OTHER, PART};

// =============================================================================
// F001-F004: Handle Ownership
// =============================================================================

/// F001: N holders share one provider handle
///
/// # Falsification Attempt
/// Acquire the same partition 16 times; more than one `request` falsifies.
#[tokio::test]
async fn f001_holders_share_one_handle() {
    let harness = PartitionTestHarness::new().unwrap();

    let leases = harness.acquire_many(PART, IMAGE, 16).await.unwrap();

    assert_eq!(
        harness.provider().requests(PART),
        1,
        "F001 FALSIFIED: every holder requested its own handle"
    );
    assert_eq!(harness.manager().reference_count(PART).await, 16);
    harness.assert_consistent(PART).await.unwrap();
    drop(leases);
}

/// F002: Concurrent first acquisitions issue a single request
///
/// # Falsification Attempt
/// Make `request` slow, then race 10 acquirers on an idle partition. If the
/// check-then-request is not serialized, several requests go out.
#[tokio::test(start_paused = true)]
async fn f002_concurrent_acquirers_issue_one_request() {
    let harness = PartitionTestHarness::builder()
        .with_faults(FaultConfig::slow_requests(Duration::from_millis(10)))
        .build()
        .unwrap();
    let start = Instant::now();

    let mut leases = Vec::new();
    for task in harness.spawn_acquirers(PART, IMAGE, 10) {
        leases.push(task.await.unwrap().unwrap());
    }

    assert_eq!(
        harness.provider().requests(PART),
        1,
        "F002 FALSIFIED: concurrent acquirers requested the handle more than once"
    );
    assert_eq!(start.elapsed(), Duration::from_millis(10));
    assert_eq!(harness.manager().reference_count(PART).await, 10);
}

/// F003: The handle is released exactly once, by the last holder
///
/// # Falsification Attempt
/// Release 5 leases one by one and watch for early or repeated releases.
#[tokio::test]
async fn f003_last_release_returns_handle() {
    let harness = PartitionTestHarness::new().unwrap();
    let mut leases = harness.acquire_many(PART, IMAGE, 5).await.unwrap();

    let mut last = leases.pop().unwrap();
    for mut lease in leases {
        lease.release().await.unwrap();
        assert_eq!(
            harness.provider().releases(),
            0,
            "F003 FALSIFIED: handle released while references remained"
        );
        harness.assert_consistent(PART).await.unwrap();
    }

    last.release().await.unwrap();
    assert_eq!(harness.provider().releases(), 1);
    assert!(!harness.provider().holds(PART));
    harness.assert_consistent(PART).await.unwrap();
}

/// F004: The count never goes negative
///
/// # Falsification Attempt
/// Release more often than acquired.
#[tokio::test]
async fn f004_surplus_release_is_rejected() {
    let harness = PartitionTestHarness::new().unwrap();
    let manager = harness.manager();

    let _fd = manager.acquire(PART, IMAGE).await.unwrap().into_raw();
    manager.release(PART).await.unwrap();

    for _ in 0..3 {
        let err = manager.release(PART).await.unwrap_err();
        assert!(
            matches!(err, PartitionError::InvalidRelease(id) if id == PART),
            "F004 FALSIFIED: surplus release returned {err:?}"
        );
    }
    assert_eq!(manager.reference_count(PART).await, 0);
    assert_eq!(harness.provider().releases(), 1);
}

// =============================================================================
// F005-F008: Isolation and Ownership Transfer
// =============================================================================

/// F005: Partitions do not serialize against each other
///
/// # Falsification Attempt
/// With a 100ms `request`, acquire two partitions concurrently. A shared
/// lock would make the pair take 200ms.
#[tokio::test(start_paused = true)]
async fn f005_partitions_are_independent() {
    let harness = PartitionTestHarness::builder()
        .with_faults(FaultConfig::slow_requests(Duration::from_millis(100)))
        .build()
        .unwrap();
    let start = Instant::now();

    let a = harness.spawn_acquirers(PART, IMAGE, 1);
    let b = harness.spawn_acquirers(OTHER, ImageId::new(2), 1);
    for task in a.into_iter().chain(b) {
        task.await.unwrap().unwrap();
    }

    assert_eq!(
        start.elapsed(),
        Duration::from_millis(100),
        "F005 FALSIFIED: acquisitions on different partitions serialized"
    );
}

/// F006: Image ownership belongs to the holder that requested the handle
///
/// # Falsification Attempt
/// A second caller asks for a different image while the first holds it.
#[tokio::test]
async fn f006_conflicting_image_is_refused() {
    let harness = PartitionTestHarness::new().unwrap();
    let _held = harness.manager().acquire(PART, IMAGE).await.unwrap();

    let err = harness
        .manager()
        .acquire(PART, ImageId::new(0xdead))
        .await
        .unwrap_err();

    assert!(
        matches!(err, PartitionError::ImageMismatch { loaded, .. } if loaded == IMAGE),
        "F006 FALSIFIED: conflicting image accepted ({err:?})"
    );
    assert_eq!(harness.manager().reference_count(PART).await, 1);
}

/// F007: Dropped leases do not leak references
///
/// # Falsification Attempt
/// Drop leases without releasing them and check the count settles at zero.
#[tokio::test(start_paused = true)]
async fn f007_dropped_leases_are_released() {
    let harness = PartitionTestHarness::new().unwrap();

    drop(harness.acquire_many(PART, IMAGE, 3).await.unwrap());
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(
        harness.manager().reference_count(PART).await,
        0,
        "F007 FALSIFIED: dropped leases kept their references"
    );
    assert_eq!(harness.provider().releases(), 1);
    harness.assert_consistent(PART).await.unwrap();
}

/// F008: Provider calls happen in request, reference, release order
///
/// # Falsification Attempt
/// Inspect the call log of a single acquire/release pair.
#[tokio::test]
async fn f008_provider_call_order() {
    let harness = PartitionTestHarness::new().unwrap();

    let mut lease = harness.manager().acquire(PART, IMAGE).await.unwrap();
    lease.release().await.unwrap();

    let calls = harness.provider().calls();
    assert_eq!(calls.len(), 3, "F008 FALSIFIED: unexpected calls {calls:?}");
    assert!(matches!(calls[0], ProviderCall::Request(r) if r.image_id == IMAGE));
    assert!(matches!(calls[1], ProviderCall::GetReference(_)));
    assert!(matches!(calls[2], ProviderCall::Release(_)));
}

// =============================================================================
// F009: Invariant Under Arbitrary Sequences
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Acquire(bool),
    Release(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Acquire),
        any::<bool>().prop_map(Op::Release),
    ]
}

proptest! {
    /// F009: Handle held iff count > 0, for any interleaving over two partitions
    #[test]
    fn f009_handle_held_iff_referenced(ops in prop::collection::vec(op(), 1..48)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let harness = PartitionTestHarness::new().unwrap();

        runtime.block_on(async {
            let mut held = [Vec::new(), Vec::new()];
            let parts = [PART, OTHER];

            for op in ops {
                let (idx, acquire) = match op {
                    Op::Acquire(first) => (usize::from(!first), true),
                    Op::Release(first) => (usize::from(!first), false),
                };
                let part = parts[idx];

                if acquire {
                    held[idx].push(harness.manager().acquire(part, IMAGE).await.unwrap());
                } else if let Some(mut lease) = held[idx].pop() {
                    lease.release().await.unwrap();
                } else {
                    prop_assert!(harness.manager().release(part).await.is_err());
                }

                for (i, part) in parts.iter().enumerate() {
                    let count = harness.manager().reference_count(*part).await;
                    prop_assert_eq!(count as usize, held[i].len());
                    harness
                        .assert_consistent(*part)
                        .await
                        .map_err(|e| TestCaseError::fail(e.to_string()))?;
                }
            }

            for leases in &mut held {
                for lease in leases.iter_mut() {
                    lease.release().await.unwrap();
                }
            }
            prop_assert_eq!(harness.provider().held_handles(), 0);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
