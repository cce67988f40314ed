//! Keypair-backed wallet

use crate::client::{LedgerClient, Wallet};
use crate::error::LedgerError;
use crate::transaction::{Confirmation, Transaction};
use clever_address::Address;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Wallet holding an ed25519 key and forwarding to a ledger
pub struct KeypairWallet {
    signing_key: SigningKey,
    ledger: Arc<dyn LedgerClient>,
    connected: AtomicBool,
    next_nonce: AtomicU64,
}

impl KeypairWallet {
    /// Wallet for an existing key
    #[must_use]
    pub fn new(signing_key: SigningKey, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            signing_key,
            ledger,
            connected: AtomicBool::new(true),
            next_nonce: AtomicU64::new(0),
        }
    }

    /// Wallet for a deterministic key derived from `seed`
    #[must_use]
    pub fn from_seed(seed: [u8; 32], ledger: Arc<dyn LedgerClient>) -> Self {
        Self::new(SigningKey::from_bytes(&seed), ledger)
    }

    /// Wallet with a freshly generated key
    #[must_use]
    pub fn generate(ledger: Arc<dyn LedgerClient>) -> Self {
        let mut csprng = OsRng;
        Self::new(SigningKey::generate(&mut csprng), ledger)
    }

    pub fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for KeypairWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeypairWallet")
            .field("identity", &self.identity().short())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Wallet for KeypairWallet {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Address {
        Address::new(self.signing_key.verifying_key().to_bytes())
    }

    async fn sign_and_submit(
        &self,
        transaction: Transaction,
    ) -> Result<Confirmation, LedgerError> {
        if !self.is_connected() {
            return Err(LedgerError::Disconnected("wallet not connected".to_string()));
        }

        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let signed = transaction.with_nonce(nonce).sign(&self.signing_key)?;
        tracing::debug!(
            instruction = signed.transaction.instruction.name(),
            nonce,
            "submitting signed transaction"
        );
        self.ledger.send_transaction(signed).await
    }
}
