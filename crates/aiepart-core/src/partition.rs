//! Per-partition state and its critical sections.
//!
//! Every mutation of a partition happens under its `state` mutex,
//! including the provider calls that change whether the handle is held.
//! Those calls run on background tasks that own the lock, so they finish
//! even when the caller that started them is cancelled.
//! Callers suspended on a reset wait on the `reset_tx` watch channel,
//! which the reset watcher writes exactly once per run.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, oneshot, watch};
use tokio::time::Instant;

use crate::error::{PartitionError, Result};
use crate::lease::PartitionLease;
use crate::manager::Shared;
use crate::status::PartitionStatus;
use crate::types::{PartitionFd, PartitionHandle, PartitionId, PartitionRequest, ResetOutcome};
use crate::watcher::ResetWatcher;

/// Mutable state of one partition.
#[derive(Debug)]
pub(crate) struct PartitionState {
    /// Provider handle; `Some` iff `reference_count > 0`.
    pub(crate) handle: Option<PartitionHandle>,
    /// Image loaded by the acquisition that requested the handle.
    pub(crate) loaded_image: Option<crate::types::ImageId>,
    /// Live references.
    pub(crate) reference_count: u32,
    /// Set between reset notification and confirmed availability.
    pub(crate) reset_in_progress: bool,
    /// A watcher task is outstanding.
    pub(crate) watcher_active: bool,
    /// Generation of the most recently scheduled watcher.
    pub(crate) watcher_generation: u64,
    /// Descriptor the watcher polls availability with.
    pub(crate) last_request: PartitionRequest,
    /// Removed from the registry by shutdown; no new references.
    pub(crate) closed: bool,
}

/// Value published on a partition's reset channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResetSignal {
    /// Watcher generation that produced this value.
    pub(crate) generation: u64,
    /// How that watcher ended; `None` before any watcher finished.
    pub(crate) outcome: Option<ResetOutcome>,
}

/// One partition entity, owned by the manager's registry.
#[derive(Debug)]
pub(crate) struct PartitionSlot {
    id: PartitionId,
    state: Arc<Mutex<PartitionState>>,
    reset_tx: watch::Sender<ResetSignal>,
}

impl PartitionSlot {
    pub(crate) fn new(request: PartitionRequest) -> Self {
        let (reset_tx, _) = watch::channel(ResetSignal {
            generation: 0,
            outcome: None,
        });
        Self {
            id: request.partition_id,
            state: Arc::new(Mutex::new(PartitionState {
                handle: None,
                loaded_image: None,
                reference_count: 0,
                reset_in_progress: false,
                watcher_active: false,
                watcher_generation: 0,
                last_request: request,
                closed: false,
            })),
            reset_tx,
        }
    }

    pub(crate) const fn id(&self) -> PartitionId {
        self.id
    }

    pub(crate) async fn status(&self) -> PartitionStatus {
        let state = self.state.lock().await;
        PartitionStatus::from_state(self.id, &state)
    }

    /// Locks the partition once no reset is in progress.
    ///
    /// Joins (or schedules) the partition's watcher while a reset is
    /// pending and returns `ResetTimeout` if the watcher it waited on gave
    /// up. Dropping the returned future removes the caller from the wait
    /// set without touching the watcher. A closed slot is returned at once.
    pub(crate) async fn lock_when_ready(
        self: &Arc<Self>,
        shared: &Arc<Shared>,
    ) -> Result<OwnedMutexGuard<PartitionState>> {
        let started = Instant::now();
        let mut suspended = false;

        loop {
            let mut state = Arc::clone(&self.state).lock_owned().await;
            if !state.reset_in_progress || state.closed {
                if suspended {
                    shared.metrics.record_reset_wait(started.elapsed());
                }
                return Ok(state);
            }

            // Subscribe under the lock so the watcher's signal cannot be missed.
            let mut rx = self.reset_tx.subscribe();
            let generation = self.ensure_watcher(&mut state, shared);
            drop(state);

            suspended = true;
            tracing::debug!(partition = %self.id, generation, "waiting for reset");

            let signal = *rx
                .wait_for(|s| s.generation >= generation && s.outcome.is_some())
                .await
                .map_err(|_| PartitionError::Internal(format!("{} reset channel closed", self.id)))?;

            if signal.generation == generation && signal.outcome == Some(ResetOutcome::TimedOut) {
                shared.metrics.record_reset_wait(started.elapsed());
                return Err(PartitionError::ResetTimeout {
                    partition: self.id,
                    waited: shared.config.reset.total_budget(),
                });
            }
            // Completed, or a later watcher already ran: re-check under the lock.
        }
    }

    /// Takes one reference and wraps it in a lease.
    ///
    /// Waiting for a reset stays cancellable. Once the partition is locked
    /// the provider calls run on a background task that owns the lock, so
    /// a caller dropped mid-call cannot leave the state half-updated.
    /// Returns `None` if the slot was closed by shutdown.
    pub(crate) async fn acquire(
        self: &Arc<Self>,
        shared: &Arc<Shared>,
        request: PartitionRequest,
    ) -> Result<Option<PartitionLease>> {
        let state = self.lock_when_ready(shared).await?;
        let (reply, rx) = oneshot::channel();
        let task = Self::complete_acquire(Arc::clone(self), Arc::clone(shared), state, request, reply);

        match shared.runtime() {
            Some(handle) => drop(handle.spawn(task)),
            None => task.await,
        }

        rx.await
            .map_err(|_| PartitionError::Internal(format!("{} acquisition task lost", self.id)))?
    }

    async fn complete_acquire(
        self: Arc<Self>,
        shared: Arc<Shared>,
        mut state: OwnedMutexGuard<PartitionState>,
        request: PartitionRequest,
        reply: oneshot::Sender<Result<Option<PartitionLease>>>,
    ) {
        let result = if state.closed {
            Ok(None)
        } else {
            self.take_reference(&shared, &mut state, request)
                .await
                .map(|fd| {
                    shared.metrics.record_acquisition();
                    Some(PartitionLease::new(
                        request.image_id,
                        fd,
                        Arc::clone(&self),
                        Arc::clone(&shared),
                    ))
                })
        };

        if let Err(Ok(Some(lease))) = reply.send(result) {
            // The caller went away; give the reference back while still locked.
            tracing::debug!(partition = %self.id, lease = %lease.id(), "acquirer cancelled, rolling back");
            let _fd = lease.into_raw();
            if let Err(e) = self.drop_reference(&shared, &mut state).await {
                tracing::warn!(partition = %self.id, error = %e, "rollback failed");
            }
        }
    }

    /// Takes one reference under the lock, requesting the handle if none is held.
    async fn take_reference(
        &self,
        shared: &Shared,
        state: &mut PartitionState,
        request: PartitionRequest,
    ) -> Result<PartitionFd> {
        if let (Some(_), Some(loaded)) = (state.handle, state.loaded_image) {
            if loaded != request.image_id {
                return Err(PartitionError::ImageMismatch {
                    partition: self.id,
                    loaded,
                    requested: request.image_id,
                });
            }
        }

        let (handle, fresh) = match state.handle {
            Some(handle) => (handle, false),
            None => {
                shared.metrics.record_provider_request();
                let handle = shared
                    .provider
                    .request(&request)
                    .await
                    .map_err(|e| PartitionError::acquisition(self.id, e))?;
                tracing::info!(
                    partition = %self.id,
                    image = %request.image_id,
                    "acquired partition handle"
                );
                state.handle = Some(handle);
                (handle, true)
            }
        };

        let fd = match shared.provider.get_reference(handle).await {
            Ok(fd) => fd,
            Err(e) => {
                if fresh {
                    // Nobody else holds it yet; give the handle back.
                    state.handle = None;
                    Self::release_handle(self.id, shared, handle).await;
                }
                return Err(PartitionError::acquisition(self.id, e));
            }
        };

        if state.loaded_image.is_none() {
            state.loaded_image = Some(request.image_id);
        }
        state.last_request = request;
        state.reference_count += 1;

        tracing::debug!(
            partition = %self.id,
            fd = %fd,
            refs = state.reference_count,
            "reference taken"
        );

        Ok(fd)
    }

    /// Drops one reference, releasing the handle at zero.
    ///
    /// Runs on a background task so the provider release completes even
    /// if the caller stops waiting.
    pub(crate) async fn release(self: &Arc<Self>, shared: &Arc<Shared>) -> Result<()> {
        let slot = Arc::clone(self);
        let owned = Arc::clone(shared);
        let task = async move {
            let mut state = slot.state.lock().await;
            slot.drop_reference(&owned, &mut state).await
        };

        match shared.runtime() {
            Some(handle) => handle.spawn(task).await.map_err(|e| {
                PartitionError::Internal(format!("{} release task failed: {e}", self.id))
            })?,
            None => task.await,
        }
    }

    async fn drop_reference(&self, shared: &Shared, state: &mut PartitionState) -> Result<()> {
        if state.reference_count == 0 {
            return Err(PartitionError::InvalidRelease(self.id));
        }
        state.reference_count -= 1;
        shared.metrics.record_release();

        tracing::debug!(partition = %self.id, refs = state.reference_count, "reference dropped");

        if state.reference_count == 0 {
            state.loaded_image = None;
            if let Some(handle) = state.handle.take() {
                Self::release_handle(self.id, shared, handle).await;
            }
        }

        Ok(())
    }

    /// Marks the partition as resetting and makes sure a watcher runs.
    ///
    /// Returns whether this call scheduled a new watcher, or `None` if the
    /// slot was closed by shutdown.
    pub(crate) async fn notify_reset(self: &Arc<Self>, shared: &Arc<Shared>) -> Option<bool> {
        let mut state = self.state.lock().await;
        if state.closed {
            return None;
        }
        shared.metrics.record_reset_notified();

        if !state.reset_in_progress {
            tracing::info!(
                partition = %self.id,
                refs = state.reference_count,
                "partition reset started"
            );
        }
        state.reset_in_progress = true;
        state.loaded_image = None;

        let was_active = state.watcher_active;
        self.ensure_watcher(&mut state, shared);
        Some(!was_active)
    }

    /// Records a watcher's termination and wakes every waiter.
    pub(crate) async fn finish_reset(&self, generation: u64, outcome: ResetOutcome) {
        let mut state = self.state.lock().await;
        state.watcher_active = false;
        if outcome.is_completed() {
            state.reset_in_progress = false;
        }
        self.reset_tx.send_replace(ResetSignal {
            generation,
            outcome: Some(outcome),
        });
    }

    /// Releases the handle regardless of outstanding references and closes
    /// the slot.
    ///
    /// Returns the number of references that were dropped with it.
    pub(crate) async fn force_release(&self, shared: &Shared) -> u32 {
        let mut state = self.state.lock().await;
        state.closed = true;
        let dropped = state.reference_count;
        state.reference_count = 0;
        state.loaded_image = None;
        if let Some(handle) = state.handle.take() {
            Self::release_handle(self.id, shared, handle).await;
        }
        dropped
    }

    /// Schedules a watcher unless one is outstanding; returns its generation.
    fn ensure_watcher(self: &Arc<Self>, state: &mut PartitionState, shared: &Arc<Shared>) -> u64 {
        if state.watcher_active {
            return state.watcher_generation;
        }

        state.watcher_generation += 1;
        state.watcher_active = true;
        let generation = state.watcher_generation;

        let watcher = ResetWatcher::new(
            Arc::clone(self),
            Arc::clone(shared),
            state.last_request,
            generation,
        );

        if shared.spawn(watcher.run()) {
            shared.metrics.record_watcher_started();
        } else {
            tracing::error!(partition = %self.id, "no runtime to schedule reset watcher");
            state.watcher_active = false;
            shared.metrics.record_reset_timeout();
            self.reset_tx.send_replace(ResetSignal {
                generation,
                outcome: Some(ResetOutcome::TimedOut),
            });
        }

        generation
    }

    /// Best-effort provider release: failures are logged, never returned.
    async fn release_handle(id: PartitionId, shared: &Shared, handle: PartitionHandle) {
        let result = shared.provider.release(handle).await;
        shared.metrics.record_provider_release(result.is_err());
        match result {
            Ok(()) => tracing::info!(partition = %id, "released partition handle"),
            Err(e) => tracing::warn!(
                partition = %id,
                error = %e,
                "provider release failed, clearing local state anyway"
            ),
        }
    }
}
