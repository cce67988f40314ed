//! Todo session facade
//!
//! The operations a UI calls. Each mutating operation runs
//! guard -> submit -> confirm -> refetch -> reconcile -> release, strictly in
//! that order; a second intent arriving meanwhile is ignored.

use crate::config::{FetchFailurePolicy, SessionConfig};
use crate::error::{ConfigError, FetchError, SessionError};
use crate::fetcher::StateFetcher;
use crate::guard::{GuardState, GuardStats, PendingGuard};
use crate::notify::{Notice, NotificationSink, TracingSink};
use crate::reconciler::Reconciler;
use crate::submitter::{Intent, Outcome, Precondition, TransactionSubmitter};
use crate::view::ViewState;
use clever_address::{Address, AddressDeriver};
use clever_ledger::{LedgerClient, Wallet};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// One user's todo session
pub struct TodoSession {
    config: SessionConfig,
    deriver: AddressDeriver,
    fetcher: StateFetcher,
    submitter: TransactionSubmitter,
    reconciler: Arc<Reconciler>,
    guard: PendingGuard,
    wallet: RwLock<Option<Arc<dyn Wallet>>>,
    sink: Arc<dyn NotificationSink>,
}

impl TodoSession {
    /// Session over `ledger` with no wallet attached
    ///
    /// # Errors
    /// `ConfigError::Invalid` if `config` fails validation
    pub fn new(config: SessionConfig, ledger: Arc<dyn LedgerClient>) -> Result<Self, ConfigError> {
        config.validate()?;
        let deriver = AddressDeriver::new(config.program_id);
        let reconciler = Arc::new(Reconciler::new(None));
        let mirror = Arc::clone(&reconciler);
        let guard =
            PendingGuard::with_listener(move |state| mirror.set_pending(state == GuardState::Busy));

        Ok(Self {
            fetcher: StateFetcher::new(ledger, deriver, config.fetch_timeout()),
            submitter: TransactionSubmitter::new(deriver, config.confirm_timeout()),
            deriver,
            reconciler,
            guard,
            wallet: RwLock::new(None),
            sink: Arc::new(TracingSink),
            config,
        })
    }

    /// Replace the notification sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn deriver(&self) -> AddressDeriver {
        self.deriver
    }

    /// Identity of the attached wallet
    #[must_use]
    pub fn identity(&self) -> Option<Address> {
        self.wallet.read().as_ref().map(|w| w.identity())
    }

    /// Current view
    #[must_use]
    pub fn snapshot(&self) -> ViewState {
        self.reconciler.snapshot()
    }

    /// Receiver notified on every view change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.reconciler.subscribe()
    }

    #[must_use]
    pub fn guard_state(&self) -> GuardState {
        self.guard.state()
    }

    #[must_use]
    pub fn guard_stats(&self) -> GuardStats {
        self.guard.stats()
    }

    /// Attach, swap or detach the wallet
    ///
    /// A new identity gets a fresh private view; reconnecting the same
    /// identity keeps the cached one. Either way the session-establishing
    /// fetch runs next. While a mutation is in flight the fetch is deferred
    /// until its permit is released, and then runs for whichever identity
    /// is attached at that point.
    #[tracing::instrument(skip_all, fields(owner = tracing::field::Empty))]
    pub async fn set_wallet(&self, wallet: Option<Arc<dyn Wallet>>) {
        let owner = wallet.as_ref().map(|w| w.identity());
        if let Some(owner) = owner {
            tracing::Span::current().record("owner", tracing::field::display(owner.short()));
        }
        *self.wallet.write() = wallet;

        if self.reconciler.snapshot().owner != owner {
            self.reconciler.reset(owner);
        }
        let Some(owner) = owner else {
            tracing::info!("wallet detached");
            return;
        };
        if self.guard.is_busy() {
            tracing::debug!("operation pending, skipping session fetch");
            return;
        }
        self.establish(&owner).await;
    }

    /// Update the draft input
    pub fn handle_input_change(&self, text: impl Into<String>) {
        self.reconciler.set_draft(text.into());
    }

    /// Re-pull the owner's state from the ledger
    ///
    /// Without a wallet this does nothing. A failure keeps the cached
    /// items and flags the view stale.
    ///
    /// # Errors
    /// `SessionError::Fetch` if the ledger cannot be read
    #[tracing::instrument(skip(self))]
    pub async fn fetch_todos(&self) -> Result<(), SessionError> {
        let Some(owner) = self.identity() else {
            tracing::debug!("no wallet, nothing to fetch");
            return Ok(());
        };
        self.refresh(&owner).await?;
        Ok(())
    }

    /// Create the owner's profile
    ///
    /// # Errors
    /// See [`SessionError`]
    #[tracing::instrument(skip(self))]
    pub async fn initialize_user(&self) -> Result<Outcome, SessionError> {
        self.run_mutation(Intent::InitUser).await
    }

    /// Add an item with `content` at the next sequence
    ///
    /// Confirmation clears the draft input.
    ///
    /// # Errors
    /// See [`SessionError`]; `AddressSpaceExhausted` once every sequence
    /// has been used
    #[tracing::instrument(skip(self, content), fields(len = content.len()))]
    pub async fn add_todo(&self, content: &str) -> Result<Outcome, SessionError> {
        self.run_mutation(Intent::AddTodo(content.to_string())).await
    }

    /// Add an item with the current draft input
    ///
    /// # Errors
    /// As [`Self::add_todo`]
    pub async fn submit_draft(&self) -> Result<Outcome, SessionError> {
        let draft = self.reconciler.snapshot().draft_input;
        self.add_todo(&draft).await
    }

    /// Mark the item stored at `address`
    ///
    /// # Errors
    /// See [`SessionError`]
    #[tracing::instrument(skip(self, address), fields(todo = %address.short()))]
    pub async fn mark_todo(&self, address: &Address) -> Result<Outcome, SessionError> {
        match self.sequence_of(address) {
            Some(sequence) => self.run_mutation(Intent::MarkTodo { sequence }).await,
            None => Ok(self.skip(self.unresolved())),
        }
    }

    /// Remove the item stored at `address`
    ///
    /// # Errors
    /// See [`SessionError`]
    #[tracing::instrument(skip(self, address), fields(todo = %address.short()))]
    pub async fn remove_todo(&self, address: &Address) -> Result<Outcome, SessionError> {
        match self.sequence_of(address) {
            Some(sequence) => self.run_mutation(Intent::RemoveTodo { sequence }).await,
            None => Ok(self.skip(self.unresolved())),
        }
    }

    async fn run_mutation(&self, intent: Intent) -> Result<Outcome, SessionError> {
        let Some(wallet) = self.wallet.read().clone() else {
            return Ok(self.skip(Precondition::NoWallet));
        };
        let owner = wallet.identity();
        let result = {
            let Some(_permit) = self.guard.try_acquire(intent.name()) else {
                return Ok(self.skip(Precondition::OperationPending));
            };
            self.mutate(&intent, wallet.as_ref(), &owner).await
        };
        self.catch_up(&owner).await;
        result
    }

    async fn mutate(
        &self,
        intent: &Intent,
        wallet: &dyn Wallet,
        owner: &Address,
    ) -> Result<Outcome, SessionError> {
        let view = self.reconciler.snapshot();
        match self.submitter.submit(intent, wallet, &view).await {
            Ok(Outcome::Confirmed(confirmation)) => {
                if matches!(intent, Intent::AddTodo(_)) {
                    self.reconciler.clear_draft();
                }
                self.sink.notify(Notice::success(intent.success_message()));
                if let Err(err) = self.refresh(owner).await {
                    self.sink.notify(Notice::warning(format!(
                        "Transaction confirmed, but refreshing todos failed: {err}"
                    )));
                }
                Ok(Outcome::Confirmed(confirmation))
            }
            Ok(Outcome::Skipped(reason)) => Ok(self.skip(reason)),
            Err(err) => {
                tracing::error!(intent = intent.name(), class = ?err.class(), %err, "operation failed");
                if err.is_unconfirmed() {
                    // The transaction may still land
                    self.reconciler.mark_stale(owner);
                }
                self.sink.notify(Notice::error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Load the attached identity if it changed while `owner`'s mutation
    /// held the guard
    async fn catch_up(&self, owner: &Address) {
        let Some(current) = self.identity() else {
            return;
        };
        if current == *owner || self.guard.is_busy() {
            return;
        }
        tracing::debug!(owner = %current.short(), "identity changed during operation, loading it now");
        self.establish(&current).await;
    }

    /// Fetch that follows an identity change
    async fn establish(&self, owner: &Address) {
        let ticket = self.reconciler.begin_fetch();
        let _loading = self.reconciler.loading();
        match self.fetcher.fetch_state(owner).await {
            Ok(result) => {
                self.reconciler.apply_fetch(ticket, owner, &result);
            }
            Err(err) => match self.config.initial_fetch_failure {
                FetchFailurePolicy::ResetToUninitialized => {
                    tracing::warn!(%err, "session fetch failed, showing identity as uninitialized");
                    self.reconciler.apply_failure(ticket, owner, true);
                }
                FetchFailurePolicy::KeepStale => {
                    tracing::warn!(%err, "session fetch failed, keeping cached view");
                    self.reconciler.apply_failure(ticket, owner, false);
                    self.sink
                        .notify(Notice::warning(format!("Could not load todos: {err}")));
                }
            },
        }
    }

    async fn refresh(&self, owner: &Address) -> Result<(), FetchError> {
        let ticket = self.reconciler.begin_fetch();
        let _loading = self.reconciler.loading();
        match self.fetcher.fetch_state(owner).await {
            Ok(result) => {
                self.reconciler.apply_fetch(ticket, owner, &result);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "refresh failed, view is stale");
                self.reconciler.apply_failure(ticket, owner, false);
                Err(err)
            }
        }
    }

    fn sequence_of(&self, address: &Address) -> Option<u8> {
        self.reconciler
            .snapshot()
            .item(address)
            .map(|item| item.sequence)
    }

    /// Why an address could not be resolved to a cached item
    fn unresolved(&self) -> Precondition {
        if self.identity().is_none() {
            Precondition::NoWallet
        } else if !self.reconciler.snapshot().initialized {
            Precondition::NotInitialized
        } else {
            Precondition::UnknownTodo
        }
    }

    fn skip(&self, reason: Precondition) -> Outcome {
        if !reason.is_silent() {
            self.sink.notify(Notice::info(reason.message()));
        }
        Outcome::Skipped(reason)
    }
}

impl fmt::Debug for TodoSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TodoSession")
            .field("owner", &self.identity())
            .field("guard", &self.guard)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
