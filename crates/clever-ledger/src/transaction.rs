//! Instructions, transactions and confirmations
//!
//! A [`Transaction`] names one [`Instruction`] plus the record addresses it
//! touches. The signer covers a domain-prefixed canonical JSON encoding, so
//! a signature for one instruction can never be replayed as another.

use crate::error::LedgerError;
use clever_address::Address;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Domain prefix mixed into every signed payload
pub const TX_DOMAIN_PREFIX: &[u8] = b"clever-todo/tx/v1:";

/// Program instruction (one per transaction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// Create the signer's profile
    InitializeUser,
    /// Create an item at the profile's next sequence
    AddTodo { content: String },
    /// Mark the item at `sequence` complete
    MarkTodo { sequence: u8 },
    /// Close the item at `sequence`
    RemoveTodo { sequence: u8 },
}

impl Instruction {
    /// Instruction name as logged by the program
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitializeUser => "initialize_user",
            Self::AddTodo { .. } => "add_todo",
            Self::MarkTodo { .. } => "mark_todo",
            Self::RemoveTodo { .. } => "remove_todo",
        }
    }

    /// Whether the instruction needs an item account
    #[must_use]
    pub const fn touches_item(&self) -> bool {
        !matches!(self, Self::InitializeUser)
    }
}

/// Record accounts passed with an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSet {
    pub profile: Address,
    pub todo: Option<Address>,
}

/// Unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub instruction: Instruction,
    pub accounts: AccountSet,
    /// Signer and owner of every touched record
    pub authority: Address,
    /// Distinguishes otherwise identical transactions
    pub nonce: u64,
}

impl Transaction {
    #[must_use]
    pub fn new(instruction: Instruction, accounts: AccountSet, authority: Address) -> Self {
        Self {
            instruction,
            accounts,
            authority,
            nonce: 0,
        }
    }

    #[must_use]
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Bytes covered by the signature
    ///
    /// # Errors
    /// Returns `LedgerError::Encoding` if serialization fails
    pub fn signing_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        let payload = serde_json::to_vec(self)?;
        let mut bytes = Vec::with_capacity(TX_DOMAIN_PREFIX.len() + payload.len());
        bytes.extend_from_slice(TX_DOMAIN_PREFIX);
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Sign with `key`
    ///
    /// # Errors
    /// Returns `LedgerError::SignatureRejected` if `key` is not the
    /// transaction's authority.
    pub fn sign(self, key: &SigningKey) -> Result<SignedTransaction, LedgerError> {
        let signer = Address::new(key.verifying_key().to_bytes());
        if signer != self.authority {
            return Err(LedgerError::SignatureRejected(format!(
                "signer {} is not authority {}",
                signer.short(),
                self.authority.short()
            )));
        }
        let signature = key.sign(&self.signing_bytes()?);
        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

/// Transaction plus the authority's signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
}

impl SignedTransaction {
    /// Check the signature against the transaction's authority
    #[must_use]
    pub fn verify(&self) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(self.transaction.authority.as_bytes()) else {
            return false;
        };
        let Ok(bytes) = self.transaction.signing_bytes() else {
            return false;
        };
        key.verify_strict(&bytes, &self.signature).is_ok()
    }

    /// Hex signature, used as the transaction id
    #[must_use]
    pub fn id(&self) -> String {
        hex::encode(self.signature.to_bytes())
    }
}

/// Acknowledgment that a transaction was durably applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Transaction id (hex signature)
    pub signature: String,
    /// Ledger slot the transaction landed in
    pub slot: u64,
}
