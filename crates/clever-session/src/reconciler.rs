//! View-state reconciler
//!
//! Sole writer of the observable [`ViewState`]. Fetch results replace
//! `initialized`, `next_sequence` and `items` wholesale; nothing is
//! patched incrementally and no record is ever added that the fetch did
//! not return.
//!
//! Every refresh takes a [`FetchTicket`] before it starts. A result is
//! applied only if its ticket is newer than the last one applied and the
//! view still belongs to the identity it was fetched for, so a slow fetch
//! can never overwrite a newer one or leak into another identity's view.

use crate::fetcher::FetchResult;
use crate::view::ViewState;
use clever_address::Address;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::watch;

/// Compute the view that results from applying `result` on top of `previous`
///
/// Session-local fields (owner, draft, busy/loading flags) carry over;
/// ledger-derived fields come from `result` alone.
#[must_use]
pub fn reconcile(previous: &ViewState, result: &FetchResult) -> ViewState {
    ViewState {
        owner: previous.owner,
        initialized: result.initialized(),
        next_sequence: result.next_sequence(),
        items: result.items.clone(),
        pending_operation: previous.pending_operation,
        loading: previous.loading,
        stale: false,
        draft_input: previous.draft_input.clone(),
    }
}

/// Ordering token for one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

/// Owner of the observable view state
#[derive(Debug)]
pub struct Reconciler {
    state: watch::Sender<ViewState>,
    issued: AtomicU64,
    applied: AtomicU64,
    in_flight: AtomicUsize,
}

impl Reconciler {
    /// Empty view for `owner`
    #[must_use]
    pub fn new(owner: Option<Address>) -> Self {
        Self {
            state: watch::Sender::new(ViewState::for_owner(owner)),
            issued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Current view
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every view change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Reserve a ticket for a refresh about to start
    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Apply a fetch result for `owner`
    ///
    /// Returns `false` (leaving the view untouched) when the view has
    /// moved to another identity or a newer refresh already landed.
    pub fn apply_fetch(&self, ticket: FetchTicket, owner: &Address, result: &FetchResult) -> bool {
        self.state.send_if_modified(|view| {
            if !self.accepts(view, ticket, owner) {
                return false;
            }
            *view = reconcile(view, result);
            true
        })
    }

    /// Record a failed refresh for `owner`
    ///
    /// With `reset` the view falls back to uninitialized and empty;
    /// otherwise the cached items stay. Either way the view is flagged
    /// stale. Returns `false` if the ticket or owner no longer applies.
    pub fn apply_failure(&self, ticket: FetchTicket, owner: &Address, reset: bool) -> bool {
        self.state.send_if_modified(|view| {
            if !self.accepts(view, ticket, owner) {
                return false;
            }
            if reset {
                *view = reconcile(view, &FetchResult::uninitialized());
            }
            view.stale = true;
            true
        })
    }

    /// Flag `owner`'s view as possibly out of date without touching items
    pub fn mark_stale(&self, owner: &Address) -> bool {
        self.state.send_if_modified(|view| {
            if view.owner != Some(*owner) || view.stale {
                return false;
            }
            view.stale = true;
            true
        })
    }

    /// Switch the view to `owner`, dropping everything cached for the
    /// previous identity
    ///
    /// Refreshes started before the switch are invalidated.
    pub fn reset(&self, owner: Option<Address>) {
        self.state.send_modify(|view| {
            self.applied
                .store(self.issued.load(Ordering::SeqCst), Ordering::SeqCst);
            let mut fresh = ViewState::for_owner(owner);
            fresh.pending_operation = view.pending_operation;
            fresh.loading = view.loading;
            *view = fresh;
        });
        tracing::debug!(owner = ?owner.map(|o| o.short()), "view reset");
    }

    /// Mirror the guard state
    pub fn set_pending(&self, pending: bool) {
        self.state.send_if_modified(|view| {
            let changed = view.pending_operation != pending;
            view.pending_operation = pending;
            changed
        });
    }

    /// Mark a fetch in flight until the returned scope drops
    #[must_use]
    pub fn loading(&self) -> LoadingScope<'_> {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.state.send_modify(|view| view.loading = true);
        }
        LoadingScope { reconciler: self }
    }

    pub fn set_draft(&self, text: String) {
        self.state.send_if_modified(|view| {
            if view.draft_input == text {
                return false;
            }
            view.draft_input = text;
            true
        });
    }

    pub fn clear_draft(&self) {
        self.set_draft(String::new());
    }

    fn accepts(&self, view: &ViewState, ticket: FetchTicket, owner: &Address) -> bool {
        if view.owner != Some(*owner) {
            tracing::debug!(owner = %owner.short(), "dropping refresh for inactive identity");
            return false;
        }
        let applied = self.applied.load(Ordering::SeqCst);
        if ticket.0 <= applied {
            tracing::debug!(ticket = ticket.0, applied, "dropping superseded refresh");
            return false;
        }
        self.applied.store(ticket.0, Ordering::SeqCst);
        true
    }

    fn finish_loading(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.send_modify(|view| view.loading = false);
        }
    }
}

/// Keeps `loading` set while alive
#[derive(Debug)]
pub struct LoadingScope<'a> {
    reconciler: &'a Reconciler,
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.reconciler.finish_loading();
    }
}
