//! Testing utilities for the Clever Todo workspace
//!
//! Shared fixtures: seeded wallets, sessions wired to an in-memory ledger,
//! a notice-collecting sink, and a ledger that ignores item filters.

#![allow(missing_docs)]

use clever_address::Address;
use clever_ledger::{
    Confirmation, Keyed, KeypairWallet, LedgerClient, LedgerError, MemoryLedger,
    SignedTransaction, TodoFilter, TodoRecord, UserProfile, Wallet,
};
use clever_session::{Notice, NoticeLevel, NotificationSink, SessionConfig, TodoSession};
use parking_lot::Mutex;
use std::sync::Arc;

pub fn program_id() -> Address {
    SessionConfig::default().program_id
}

pub fn memory_ledger() -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::new(program_id()))
}

/// Connected wallet whose key is derived from `seed`
pub fn seeded_wallet(seed: u8, ledger: Arc<dyn LedgerClient>) -> Arc<KeypairWallet> {
    Arc::new(KeypairWallet::from_seed([seed; 32], ledger))
}

/// Sink that keeps every notice
#[derive(Debug, Default)]
pub struct CollectingSink {
    notices: Mutex<Vec<Notice>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices.lock().iter().map(|n| n.message.clone()).collect()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices.lock().iter().filter(|n| n.level == level).count()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Session plus the handles tests poke at
pub struct Fixture {
    pub ledger: Arc<MemoryLedger>,
    pub wallet: Arc<KeypairWallet>,
    pub session: TodoSession,
    pub sink: Arc<CollectingSink>,
}

impl Fixture {
    /// Session with `config` over a fresh ledger, wallet not yet attached
    pub fn with_config(seed: u8, config: SessionConfig) -> Self {
        let ledger = Arc::new(MemoryLedger::new(config.program_id));
        let wallet = seeded_wallet(seed, ledger.clone());
        let sink = CollectingSink::new();
        let session = TodoSession::new(config, ledger.clone())
            .unwrap()
            .with_sink(sink.clone());
        Self {
            ledger,
            wallet,
            session,
            sink,
        }
    }

    pub fn new(seed: u8) -> Self {
        Self::with_config(seed, SessionConfig::default())
    }

    /// Attached wallet, session fetch done
    pub async fn connected(seed: u8) -> Self {
        let fixture = Self::new(seed);
        fixture.connect().await;
        fixture
    }

    /// Connected and initialized
    pub async fn initialized(seed: u8) -> Self {
        let fixture = Self::connected(seed).await;
        fixture.session.initialize_user().await.unwrap();
        fixture
    }

    pub async fn connect(&self) {
        self.session.set_wallet(Some(self.wallet.clone())).await;
    }

    pub fn owner(&self) -> Address {
        self.wallet.identity()
    }

    /// Derived address of the owner's item at `sequence`
    pub fn todo_address(&self, sequence: u64) -> Address {
        self.ledger
            .deriver()
            .todo_address(&self.owner(), sequence)
            .unwrap()
    }
}

/// Ledger that returns every item regardless of the requested filter
#[derive(Debug)]
pub struct LeakyLedger {
    inner: Arc<MemoryLedger>,
    foreign_profile: Mutex<Option<Address>>,
}

impl LeakyLedger {
    pub fn new(inner: Arc<MemoryLedger>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            foreign_profile: Mutex::new(None),
        })
    }

    /// Report every profile as owned by `authority`
    pub fn claim_profiles_for(&self, authority: Address) {
        *self.foreign_profile.lock() = Some(authority);
    }
}

#[async_trait::async_trait]
impl LedgerClient for LeakyLedger {
    async fn fetch_profile(
        &self,
        address: &Address,
    ) -> Result<Option<Keyed<UserProfile>>, LedgerError> {
        let found = self.inner.fetch_profile(address).await?;
        let foreign = *self.foreign_profile.lock();
        Ok(match (found, foreign) {
            (Some(mut keyed), Some(authority)) => {
                keyed.record.authority = authority;
                Some(keyed)
            }
            (found, _) => found,
        })
    }

    async fn fetch_todos(
        &self,
        _filter: &TodoFilter,
    ) -> Result<Vec<Keyed<TodoRecord>>, LedgerError> {
        self.inner.fetch_todos(&TodoFilter::all()).await
    }

    async fn send_transaction(
        &self,
        transaction: SignedTransaction,
    ) -> Result<Confirmation, LedgerError> {
        self.inner.send_transaction(transaction).await
    }
}
