//! Collaborator traits
//!
//! [`LedgerClient`] is the remote ledger service; [`Wallet`] is the
//! authentication provider that owns the signing key. The session core
//! talks to both only through these seams.

use crate::error::LedgerError;
use crate::record::{Keyed, TodoFilter, TodoRecord, UserProfile};
use crate::transaction::{Confirmation, SignedTransaction, Transaction};
use clever_address::Address;

/// Remote ledger service
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch one profile record; `Ok(None)` when it does not exist
    async fn fetch_profile(
        &self,
        address: &Address,
    ) -> Result<Option<Keyed<UserProfile>>, LedgerError>;

    /// Fetch every item record passing `filter`
    async fn fetch_todos(&self, filter: &TodoFilter)
        -> Result<Vec<Keyed<TodoRecord>>, LedgerError>;

    /// Submit a signed transaction and wait for its confirmation
    async fn send_transaction(
        &self,
        transaction: SignedTransaction,
    ) -> Result<Confirmation, LedgerError>;
}

/// Authentication provider
///
/// Signing happens entirely inside the wallet; callers only hand over the
/// unsigned transaction.
#[async_trait::async_trait]
pub trait Wallet: Send + Sync {
    /// Whether the wallet can currently sign
    fn is_connected(&self) -> bool;

    /// Public identity of the signer
    fn identity(&self) -> Address;

    /// Sign `transaction` and submit it, waiting for confirmation
    async fn sign_and_submit(&self, transaction: Transaction)
        -> Result<Confirmation, LedgerError>;
}
