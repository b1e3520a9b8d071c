// Demos are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! aiepart Partition Example
//!
//! Drives the partition lifecycle against a simulated platform: shared
//! acquisition, a hardware reset that holds callers back, and release.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example partition
//!
//! # Watch the reset watcher poll
//! RUST_LOG=aiepart_core=debug cargo run --example partition
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use aiepart::prelude::*;
use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

/// Config as it would sit in the driver's config file.
const CONFIG: &str = r#"
release_on_drop = true

[reset]
poll_interval = "5ms"
max_attempts = 40
"#;

/// Platform where a reset makes a partition unavailable for a fixed time.
#[derive(Default)]
struct SimulatedPlatform {
    next_handle: AtomicU64,
    next_fd: AtomicI32,
    busy_until: Mutex<HashMap<PartitionId, Instant>>,
}

impl SimulatedPlatform {
    fn reset(&self, partition: PartitionId, downtime: Duration) {
        self.busy_until
            .lock()
            .unwrap()
            .insert(partition, Instant::now() + downtime);
    }
}

#[async_trait]
impl PartitionProvider for SimulatedPlatform {
    async fn request(&self, request: &PartitionRequest) -> ProviderResult<PartitionHandle> {
        let raw = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        println!(
            "[PLATFORM] request {} with image {} -> handle {raw}",
            request.partition_id, request.image_id
        );
        Ok(PartitionHandle::new(raw))
    }

    async fn get_reference(&self, _handle: PartitionHandle) -> ProviderResult<PartitionFd> {
        Ok(PartitionFd::new(
            self.next_fd.fetch_add(1, Ordering::SeqCst) + 3,
        ))
    }

    async fn release(&self, handle: PartitionHandle) -> ProviderResult<()> {
        println!("[PLATFORM] release handle {}", handle.as_raw());
        Ok(())
    }

    async fn is_available(&self, request: &PartitionRequest) -> bool {
        self.busy_until
            .lock()
            .unwrap()
            .get(&request.partition_id)
            .is_none_or(|until| Instant::now() >= *until)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let platform = Arc::new(SimulatedPlatform::default());
    let config = ManagerConfig::from_toml_str(CONFIG)?;
    let manager = Arc::new(PartitionManager::new(platform.clone(), config)?);

    let part = PartitionId::new(0);
    let image = ImageId::new(0x0000_a1e5);

    // Two callers share one platform handle.
    let mut first = manager.acquire(part, image).await?;
    let mut second = manager.acquire(part, image).await?;
    println!(
        "[MAIN] leases {} and {} on {part}",
        first.fd(),
        second.fd()
    );
    println!("[MAIN] status: {}", manager.status(part).await?.to_json()?);

    // The hardware resets; a third caller waits for it.
    platform.reset(part, Duration::from_millis(60));
    manager.notify_reset(part).await;

    let waiter = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move {
            let started = Instant::now();
            let lease = manager.acquire(part, image).await;
            (lease, started.elapsed())
        }
    });

    // Existing holders are not blocked by the reset.
    first.release().await?;
    second.release().await?;
    println!("[MAIN] original holders released");

    let (lease, waited) = waiter.await?;
    let mut lease = lease?;
    println!("[MAIN] waiter got {} after {waited:?}", lease.fd());
    lease.release().await?;

    let metrics = manager.metrics().snapshot();
    println!(
        "[MAIN] acquisitions={} polls={} resets_completed={}",
        metrics.acquisitions, metrics.availability_polls, metrics.resets_completed
    );

    manager.shutdown().await;
    Ok(())
}
