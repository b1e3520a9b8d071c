//! Fault injection for provider resilience testing.
//!
//! Faults are deterministic: latency is applied on every matching call and
//! failures are consumed from a per-operation budget, so tests on a paused
//! clock observe exact counts.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use aiepart_core::ProviderError;

/// Provider operation a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `request`.
    Request,
    /// `get_reference`.
    Reference,
    /// `release`.
    Release,
    /// `is_available`.
    Poll,
}

/// Kind of error an injected failure produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FaultKind {
    /// Transient: the partition is busy.
    #[default]
    Busy,
    /// The partition is unknown to the platform.
    NotFound,
    /// Stale handle.
    InvalidHandle,
    /// Opaque platform failure.
    Platform,
}

impl FaultKind {
    fn to_error(self, op: Operation) -> ProviderError {
        match self {
            Self::Busy => ProviderError::Busy,
            Self::NotFound => ProviderError::NotFound,
            Self::InvalidHandle => ProviderError::InvalidHandle,
            Self::Platform => ProviderError::platform(format!("injected {op:?} failure")),
        }
    }
}

/// Fault injection configuration.
#[derive(Debug, Clone, Default)]
pub struct FaultConfig {
    /// Delay added to every `request`.
    pub request_latency: Option<Duration>,
    /// Delay added to every `get_reference`.
    pub reference_latency: Option<Duration>,
    /// Delay added to every `release`.
    pub release_latency: Option<Duration>,
    /// Delay added to every `is_available`.
    pub poll_latency: Option<Duration>,
    /// Number of `request` calls to fail before succeeding.
    pub request_failures: u32,
    /// Number of `get_reference` calls to fail before succeeding.
    pub reference_failures: u32,
    /// Number of `release` calls to fail before succeeding.
    pub release_failures: u32,
    /// Error returned by injected failures.
    pub kind: FaultKind,
}

impl FaultConfig {
    /// Slows every provider request down by `delay`.
    #[must_use]
    pub fn slow_requests(delay: Duration) -> Self {
        Self {
            request_latency: Some(delay),
            ..Default::default()
        }
    }

    /// Fails the first `count` requests with the given kind.
    #[must_use]
    pub fn failing_requests(count: u32, kind: FaultKind) -> Self {
        Self {
            request_failures: count,
            kind,
            ..Default::default()
        }
    }

    /// Slows every provider release down by `delay`.
    #[must_use]
    pub fn slow_releases(delay: Duration) -> Self {
        Self {
            release_latency: Some(delay),
            ..Default::default()
        }
    }

    /// Slows every `get_reference` down by `delay`.
    #[must_use]
    pub fn slow_references(delay: Duration) -> Self {
        Self {
            reference_latency: Some(delay),
            ..Default::default()
        }
    }

    /// Fails the first `count` releases.
    #[must_use]
    pub fn failing_releases(count: u32) -> Self {
        Self {
            release_failures: count,
            kind: FaultKind::Platform,
            ..Default::default()
        }
    }

    /// Returns the latency configured for an operation.
    #[must_use]
    pub const fn latency(&self, op: Operation) -> Option<Duration> {
        match op {
            Operation::Request => self.request_latency,
            Operation::Release => self.release_latency,
            Operation::Poll => self.poll_latency,
            Operation::Reference => self.reference_latency,
        }
    }
}

/// Applies a [`FaultConfig`] to provider calls.
#[derive(Debug)]
pub struct FaultInjector {
    config: FaultConfig,
    active: AtomicBool,
    request_failures: AtomicU32,
    reference_failures: AtomicU32,
    release_failures: AtomicU32,
}

impl FaultInjector {
    /// Creates an inactive injector.
    #[must_use]
    pub const fn new(config: FaultConfig) -> Self {
        Self {
            request_failures: AtomicU32::new(config.request_failures),
            reference_failures: AtomicU32::new(config.reference_failures),
            release_failures: AtomicU32::new(config.release_failures),
            config,
            active: AtomicBool::new(false),
        }
    }

    /// Starts injecting faults.
    pub fn start(&self) {
        tracing::warn!("starting fault injection: {:?}", self.config);
        self.active.store(true, Ordering::SeqCst);
    }

    /// Stops injecting faults. Unspent failure budgets are kept.
    pub fn stop(&self) {
        tracing::info!("stopping fault injection");
        self.active.store(false, Ordering::SeqCst);
    }

    /// Returns true if fault injection is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns the fault config.
    #[must_use]
    pub const fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Sleeps for the operation's configured latency, if active.
    pub async fn maybe_inject_latency(&self, op: Operation) {
        if !self.is_active() {
            return;
        }

        if let Some(delay) = self.config.latency(op) {
            tracing::debug!(?op, "injecting latency: {delay:?}");
            tokio::time::sleep(delay).await;
        }
    }

    /// Consumes one failure from the operation's budget, if active.
    #[must_use]
    pub fn take_failure(&self, op: Operation) -> Option<ProviderError> {
        if !self.is_active() {
            return None;
        }

        let budget = match op {
            Operation::Request => &self.request_failures,
            Operation::Reference => &self.reference_failures,
            Operation::Release => &self.release_failures,
            Operation::Poll => return None,
        };

        budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| {
                tracing::debug!(?op, "injecting failure");
                self.config.kind.to_error(op)
            })
    }

    /// Returns the failures still to be injected for an operation.
    #[must_use]
    pub fn remaining_failures(&self, op: Operation) -> u32 {
        match op {
            Operation::Request => self.request_failures.load(Ordering::SeqCst),
            Operation::Reference => self.reference_failures.load(Ordering::SeqCst),
            Operation::Release => self.release_failures.load(Ordering::SeqCst),
            Operation::Poll => 0,
        }
    }
}
