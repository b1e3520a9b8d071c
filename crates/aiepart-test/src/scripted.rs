//! Scriptable partition provider.
//!
//! Stands in for the platform layer in integration tests. Every call is
//! logged, held handles are tracked per partition, availability after a
//! reset follows a per-partition script, and a [`FaultInjector`] can slow
//! down or fail individual operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use aiepart_core::{
    PartitionFd, PartitionHandle, PartitionId, PartitionProvider, PartitionRequest,
    ProviderError, ProviderResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::fault::{FaultConfig, FaultInjector, Operation};

/// When a partition reports available after a reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Availability {
    /// Every poll succeeds.
    #[default]
    Always,
    /// The n-th poll (1-based) and every later one succeed.
    AfterPolls(u32),
    /// No poll succeeds.
    Never,
}

/// One recorded provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderCall {
    /// `request` for a partition.
    Request(PartitionRequest),
    /// `get_reference` on a handle.
    GetReference(PartitionHandle),
    /// `release` of a handle.
    Release(PartitionHandle),
    /// `is_available` for a partition.
    Poll(PartitionId),
}

#[derive(Debug, Default)]
struct Script {
    availability: HashMap<PartitionId, Availability>,
    polls: HashMap<PartitionId, u32>,
    held: HashMap<PartitionHandle, PartitionId>,
    calls: Vec<ProviderCall>,
}

#[derive(Debug)]
struct Inner {
    script: Mutex<Script>,
    faults: FaultInjector,
    next_handle: AtomicU64,
    next_fd: AtomicI32,
}

/// Provider whose behavior is scripted by the test.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    inner: Arc<Inner>,
}

impl ScriptedProvider {
    /// Creates a provider that grants everything and is always available.
    #[must_use]
    pub fn new() -> Self {
        Self::with_faults(FaultConfig::default())
    }

    /// Creates a provider with active fault injection.
    #[must_use]
    pub fn with_faults(faults: FaultConfig) -> Self {
        let injector = FaultInjector::new(faults);
        injector.start();
        Self {
            inner: Arc::new(Inner {
                script: Mutex::new(Script::default()),
                faults: injector,
                next_handle: AtomicU64::new(1),
                next_fd: AtomicI32::new(10),
            }),
        }
    }

    /// Shares the provider as a trait object.
    #[must_use]
    pub fn shared(&self) -> Arc<dyn PartitionProvider> {
        Arc::new(self.clone())
    }

    /// Returns the fault injector.
    #[must_use]
    pub fn faults(&self) -> &FaultInjector {
        &self.inner.faults
    }

    /// Scripts availability for a partition and restarts its poll count.
    pub fn set_availability(&self, partition: PartitionId, availability: Availability) {
        let mut script = self.inner.script.lock();
        script.availability.insert(partition, availability);
        script.polls.insert(partition, 0);
    }

    /// Returns availability polls made for a partition.
    #[must_use]
    pub fn polls(&self, partition: PartitionId) -> u32 {
        self.inner
            .script
            .lock()
            .polls
            .get(&partition)
            .copied()
            .unwrap_or(0)
    }

    /// Returns true if the provider has a handle outstanding for the partition.
    #[must_use]
    pub fn holds(&self, partition: PartitionId) -> bool {
        self.inner
            .script
            .lock()
            .held
            .values()
            .any(|held| *held == partition)
    }

    /// Returns the number of handles outstanding across all partitions.
    #[must_use]
    pub fn held_handles(&self) -> usize {
        self.inner.script.lock().held.len()
    }

    /// Returns every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.inner.script.lock().calls.clone()
    }

    /// Returns the number of `request` calls for a partition.
    #[must_use]
    pub fn requests(&self, partition: PartitionId) -> usize {
        self.inner
            .script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ProviderCall::Request(r) if r.partition_id == partition))
            .count()
    }

    /// Returns the number of `release` calls.
    #[must_use]
    pub fn releases(&self) -> usize {
        self.inner
            .script
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, ProviderCall::Release(_)))
            .count()
    }

    fn record(&self, call: ProviderCall) {
        self.inner.script.lock().calls.push(call);
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartitionProvider for ScriptedProvider {
    async fn request(&self, request: &PartitionRequest) -> ProviderResult<PartitionHandle> {
        self.record(ProviderCall::Request(*request));
        if let Some(err) = self.inner.faults.take_failure(Operation::Request) {
            return Err(err);
        }

        // The platform owns the handle from here on, even if the caller
        // never sees the answer.
        let handle = PartitionHandle::new(self.inner.next_handle.fetch_add(1, Ordering::SeqCst));
        self.inner
            .script
            .lock()
            .held
            .insert(handle, request.partition_id);
        self.inner.faults.maybe_inject_latency(Operation::Request).await;

        tracing::trace!(partition = %request.partition_id, handle = handle.as_raw(), "scripted request");
        Ok(handle)
    }

    async fn get_reference(&self, handle: PartitionHandle) -> ProviderResult<PartitionFd> {
        self.record(ProviderCall::GetReference(handle));
        self.inner.faults.maybe_inject_latency(Operation::Reference).await;
        if let Some(err) = self.inner.faults.take_failure(Operation::Reference) {
            return Err(err);
        }
        if !self.inner.script.lock().held.contains_key(&handle) {
            return Err(ProviderError::InvalidHandle);
        }
        Ok(PartitionFd::new(
            self.inner.next_fd.fetch_add(1, Ordering::SeqCst),
        ))
    }

    async fn release(&self, handle: PartitionHandle) -> ProviderResult<()> {
        self.record(ProviderCall::Release(handle));
        self.inner.faults.maybe_inject_latency(Operation::Release).await;

        // The platform frees the handle even when it reports an error.
        let known = self.inner.script.lock().held.remove(&handle).is_some();
        if let Some(err) = self.inner.faults.take_failure(Operation::Release) {
            return Err(err);
        }
        if known {
            Ok(())
        } else {
            Err(ProviderError::InvalidHandle)
        }
    }

    async fn is_available(&self, request: &PartitionRequest) -> bool {
        let partition = request.partition_id;
        self.record(ProviderCall::Poll(partition));
        self.inner.faults.maybe_inject_latency(Operation::Poll).await;

        let mut script = self.inner.script.lock();
        let polls = script.polls.entry(partition).or_insert(0);
        *polls += 1;
        let poll = *polls;

        match script.availability.get(&partition).copied().unwrap_or_default() {
            Availability::Always => true,
            Availability::AfterPolls(target) => poll >= target,
            Availability::Never => false,
        }
    }
}
