//! Pending-operation guard
//!
//! At most one mutating operation is in flight per session. Acquiring
//! returns an [`OperationPermit`]; the guard goes back to `Idle` when the
//! permit drops, whatever path the operation took to finish.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Guard state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardState {
    Idle,
    Busy,
}

/// Acquisition counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStats {
    /// Intents that obtained a permit
    pub accepted: u64,
    /// Intents turned away while busy
    pub rejected: u64,
}

type Listener = Box<dyn Fn(GuardState) + Send + Sync>;

/// Mutual exclusion for mutating intents
///
/// Intents arriving while busy are rejected, never queued.
#[derive(Default)]
pub struct PendingGuard {
    busy: AtomicBool,
    listener: Option<Listener>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl PendingGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Guard that reports every transition to `listener`
    #[must_use]
    pub fn with_listener(listener: impl Fn(GuardState) + Send + Sync + 'static) -> Self {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        if self.busy.load(Ordering::SeqCst) {
            GuardState::Busy
        } else {
            GuardState::Idle
        }
    }

    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state() == GuardState::Busy
    }

    /// Move `Idle -> Busy` for `operation`
    ///
    /// Returns `None` without side effects if another operation holds the
    /// guard.
    pub fn try_acquire(&self, operation: &'static str) -> Option<OperationPermit<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(operation, "operation pending, intent ignored");
            return None;
        }

        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.notify(GuardState::Busy);
        tracing::trace!(operation, "guard acquired");
        Some(OperationPermit {
            guard: self,
            operation,
            started: Instant::now(),
        })
    }

    #[must_use]
    pub fn stats(&self) -> GuardStats {
        GuardStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    fn release(&self) {
        // Report Idle before clearing the flag so a new holder's Busy
        // report always lands after ours.
        self.notify(GuardState::Idle);
        self.busy.store(false, Ordering::SeqCst);
    }

    fn notify(&self, state: GuardState) {
        if let Some(listener) = &self.listener {
            listener(state);
        }
    }
}

impl fmt::Debug for PendingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingGuard")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Proof of holding the guard; releases it on drop
#[must_use = "dropping the permit releases the guard immediately"]
pub struct OperationPermit<'a> {
    guard: &'a PendingGuard,
    operation: &'static str,
    started: Instant,
}

impl OperationPermit<'_> {
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Debug for OperationPermit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationPermit")
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

impl Drop for OperationPermit<'_> {
    fn drop(&mut self) {
        tracing::trace!(
            operation = self.operation,
            elapsed = ?self.started.elapsed(),
            "guard released"
        );
        self.guard.release();
    }
}
