//! Falsification Tests: Category B - Reset Handling (F010-F019)
//!
//! Claims about what callers observe while a partition resets, and about
//! the single bounded watcher behind it. All tests run on the paused clock.

use std::time::Duration;

use aiepart_core::{ImageId, PartitionError};
use aiepart_test::{Availability, FaultConfig, PartitionTestHarness};
use tokio::time::Instant;

use super::{IMAGE, OTHER, PART};

// =============================================================================
// F010-F013: Waiting on a Reset
// =============================================================================

/// F010: Acquisition during a reset suspends instead of failing
///
/// # Falsification Attempt
/// Five callers acquire right after a reset that clears on the 4th poll.
#[tokio::test(start_paused = true)]
async fn f010_acquire_during_reset_suspends() {
    let harness = PartitionTestHarness::new().unwrap();
    harness
        .provider()
        .set_availability(PART, Availability::AfterPolls(4));
    let start = Instant::now();

    harness.manager().notify_reset(PART).await;
    for task in harness.spawn_acquirers(PART, IMAGE, 5) {
        let result = task.await.unwrap();
        assert!(
            result.is_ok(),
            "F010 FALSIFIED: acquisition during reset failed with {result:?}"
        );
    }

    assert_eq!(start.elapsed(), Duration::from_millis(4));
    assert_eq!(harness.provider().polls(PART), 4);
    assert_eq!(harness.provider().requests(PART), 1);
    harness.assert_consistent(PART).await.unwrap();
}

/// F011: One watcher per reset, however many callers pile up
///
/// # Falsification Attempt
/// Notify 20 times and park 20 acquirers on the same reset.
#[tokio::test(start_paused = true)]
async fn f011_single_watcher_per_reset() {
    let harness = PartitionTestHarness::new().unwrap();
    harness
        .provider()
        .set_availability(PART, Availability::AfterPolls(6));

    let mut scheduled = 0;
    for _ in 0..20 {
        if harness.manager().notify_reset(PART).await {
            scheduled += 1;
        }
    }
    for task in harness.spawn_acquirers(PART, IMAGE, 20) {
        task.await.unwrap().unwrap();
    }

    assert_eq!(scheduled, 1, "F011 FALSIFIED: {scheduled} watchers scheduled");
    assert_eq!(harness.manager().metrics().watchers_started(), 1);
    assert_eq!(
        harness.provider().polls(PART),
        6,
        "F011 FALSIFIED: availability polled by more than one loop"
    );
}

/// F012: The watcher gives up after exactly the attempt bound
///
/// # Falsification Attempt
/// A partition that never comes back, with three waiters and a bound of 8.
#[tokio::test(start_paused = true)]
async fn f012_watcher_is_bounded() {
    let harness = PartitionTestHarness::builder()
        .with_max_attempts(8)
        .build()
        .unwrap();
    harness.provider().set_availability(PART, Availability::Never);
    let start = Instant::now();

    harness.manager().notify_reset(PART).await;
    for task in harness.spawn_acquirers(PART, IMAGE, 3) {
        let err = task.await.unwrap().unwrap_err();
        assert!(
            matches!(err, PartitionError::ResetTimeout { partition, .. } if partition == PART),
            "F012 FALSIFIED: waiter got {err:?}"
        );
    }

    assert_eq!(harness.provider().polls(PART), 8);
    assert_eq!(start.elapsed(), Duration::from_millis(8));
    assert_eq!(harness.manager().metrics().reset_timeouts(), 1);
    assert_eq!(harness.provider().requests(PART), 0);
}

/// F013: A timeout is never reported before the budget is spent
///
/// # Falsification Attempt
/// Check the waiter just before the last of three 10ms polls.
#[tokio::test(start_paused = true)]
async fn f013_timeout_not_reported_early() {
    let harness = PartitionTestHarness::builder()
        .with_poll_interval(Duration::from_millis(10))
        .with_max_attempts(3)
        .build()
        .unwrap();
    harness.provider().set_availability(PART, Availability::Never);

    harness.manager().notify_reset(PART).await;
    let waiter = harness.spawn_acquirers(PART, IMAGE, 1).remove(0);

    tokio::time::sleep(Duration::from_millis(29)).await;
    assert!(
        !waiter.is_finished(),
        "F013 FALSIFIED: waiter released before the budget was spent"
    );

    let err = waiter.await.unwrap().unwrap_err();
    assert!(err.is_retryable());
}

// =============================================================================
// F014-F016: Resets Against Live State
// =============================================================================

/// F014: A reset after a completed reset gets a fresh watcher
///
/// # Falsification Attempt
/// Reset twice in a row; a latched watcher would skip the second poll loop.
#[tokio::test(start_paused = true)]
async fn f014_successive_resets_each_watched() {
    let harness = PartitionTestHarness::new().unwrap();

    harness
        .reset_and_wait(PART, Availability::AfterPolls(2))
        .await
        .unwrap();
    harness
        .reset_and_wait(PART, Availability::AfterPolls(3))
        .await
        .unwrap();

    assert_eq!(
        harness.manager().metrics().watchers_started(),
        2,
        "F014 FALSIFIED: second reset was not watched"
    );
    assert_eq!(harness.provider().polls(PART), 3);
    assert_eq!(harness.manager().metrics().resets_completed(), 2);
}

/// F015: A reset does not revoke references, and releasing does not wait
///
/// # Falsification Attempt
/// Hold two references across a reset that never completes, then release.
#[tokio::test(start_paused = true)]
async fn f015_release_during_reset_is_immediate() {
    let harness = PartitionTestHarness::builder()
        .with_max_attempts(1_000)
        .build()
        .unwrap();
    let mut leases = harness.acquire_many(PART, IMAGE, 2).await.unwrap();

    harness.provider().set_availability(PART, Availability::Never);
    harness.manager().notify_reset(PART).await;
    assert_eq!(harness.manager().reference_count(PART).await, 2);

    let start = Instant::now();
    for lease in &mut leases {
        lease.release().await.unwrap();
    }

    assert_eq!(
        start.elapsed(),
        Duration::ZERO,
        "F015 FALSIFIED: release waited on the reset"
    );
    assert_eq!(harness.provider().releases(), 1);
    harness.assert_consistent(PART).await.unwrap();
}

/// F016: A reset on one partition does not block another
///
/// # Falsification Attempt
/// Acquire a healthy partition while a sibling is stuck in reset.
#[tokio::test(start_paused = true)]
async fn f016_reset_is_partition_local() {
    let harness = PartitionTestHarness::builder()
        .with_max_attempts(1_000)
        .build()
        .unwrap();
    harness.provider().set_availability(PART, Availability::Never);
    harness.manager().notify_reset(PART).await;

    let start = Instant::now();
    let lease = harness
        .manager()
        .acquire(OTHER, ImageId::new(3))
        .await
        .unwrap();

    assert_eq!(
        start.elapsed(),
        Duration::ZERO,
        "F016 FALSIFIED: healthy partition waited on a sibling's reset"
    );
    assert_eq!(lease.partition_id(), OTHER);
    assert!(harness.manager().is_reset_in_progress(PART).await);
}

// =============================================================================
// F017-F019: Watcher Timing and Waiter Independence
// =============================================================================

/// F017: The watcher waits one interval before every poll
///
/// # Falsification Attempt
/// With a 1ms interval and 2ms polls, three polls must take 9ms.
#[tokio::test(start_paused = true)]
async fn f017_interval_precedes_every_poll() {
    let harness = PartitionTestHarness::builder()
        .with_faults(FaultConfig {
            poll_latency: Some(Duration::from_millis(2)),
            ..Default::default()
        })
        .build()
        .unwrap();
    let start = Instant::now();

    harness
        .reset_and_wait(PART, Availability::AfterPolls(3))
        .await
        .unwrap();

    assert_eq!(
        start.elapsed(),
        Duration::from_millis(9),
        "F017 FALSIFIED: watcher polled without waiting the interval"
    );
}

/// F018: A waiter that gives up does not disturb the others
///
/// # Falsification Attempt
/// Cancel one of two waiters halfway through the reset.
#[tokio::test(start_paused = true)]
async fn f018_cancelled_waiter_is_isolated() {
    let harness = PartitionTestHarness::new().unwrap();
    harness
        .provider()
        .set_availability(PART, Availability::AfterPolls(6));
    harness.manager().notify_reset(PART).await;

    let impatient = harness.within(
        Duration::from_millis(3),
        harness.manager().acquire(PART, IMAGE),
    );
    assert!(impatient.await.is_err());

    let lease = harness.manager().acquire(PART, IMAGE).await;
    assert!(
        lease.is_ok(),
        "F018 FALSIFIED: remaining waiter failed after a cancellation"
    );
    assert_eq!(harness.manager().metrics().watchers_started(), 1);
    assert_eq!(harness.provider().polls(PART), 6);
    assert_eq!(harness.manager().reference_count(PART).await, 1);
}

/// F019: A reset nobody waits on still completes
///
/// # Falsification Attempt
/// Notify and walk away; the flag must clear on its own.
#[tokio::test(start_paused = true)]
async fn f019_unwatched_reset_completes() {
    let harness = PartitionTestHarness::new().unwrap();
    harness
        .provider()
        .set_availability(PART, Availability::AfterPolls(2));

    assert!(harness.manager().notify_reset(PART).await);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let status = harness.manager().status(PART).await.unwrap();
    assert!(
        !status.reset_in_progress,
        "F019 FALSIFIED: reset stayed pending with no waiter"
    );
    assert!(!status.watcher_active);
}
