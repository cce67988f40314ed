//! Transaction submitter
//!
//! Turns an [`Intent`] into a transaction over derived accounts, hands it
//! to the wallet, and waits (bounded) for the confirmation. Local
//! preconditions are settled here and never reach the ledger. The view is
//! only read; applying the outcome is the caller's business.

use crate::error::{SessionError, TxError};
use crate::view::ViewState;
use clever_address::{Address, AddressDeriver};
use clever_ledger::{AccountSet, Confirmation, Instruction, Transaction, Wallet};
use std::fmt;
use std::time::Duration;

/// Mutating intent raised by the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    InitUser,
    AddTodo(String),
    MarkTodo { sequence: u8 },
    RemoveTodo { sequence: u8 },
}

impl Intent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InitUser => "initialize_user",
            Self::AddTodo(_) => "add_todo",
            Self::MarkTodo { .. } => "mark_todo",
            Self::RemoveTodo { .. } => "remove_todo",
        }
    }

    /// Notice shown once the intent confirms
    #[must_use]
    pub const fn success_message(&self) -> &'static str {
        match self {
            Self::InitUser => "Successfully initialized user.",
            Self::AddTodo(_) => "Successfully added todo.",
            Self::MarkTodo { .. } => "Successfully marked todo.",
            Self::RemoveTodo { .. } => "Successfully removed todo.",
        }
    }
}

/// Local reason for not submitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precondition {
    /// Add with blank content
    EmptyContent,
    /// Init when the view already shows a profile
    AlreadyInitialized,
    /// Add, mark or remove before init
    NotInitialized,
    /// Mark on an item the view shows as marked
    AlreadyMarked,
    /// Mark or remove on an item not in the view
    UnknownTodo,
    /// Wallet present but not connected
    WalletDisconnected,
    /// No wallet attached to the session
    NoWallet,
    /// Another operation holds the guard
    OperationPending,
}

impl Precondition {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::EmptyContent => "Todo content cannot be empty.",
            Self::AlreadyInitialized => "User already initialized!",
            Self::NotInitialized => "Initialize your account first.",
            Self::AlreadyMarked => "Todo is already marked.",
            Self::UnknownTodo => "Todo not found.",
            Self::WalletDisconnected => "Wallet is not connected.",
            Self::NoWallet => "Connect a wallet first.",
            Self::OperationPending => "Another operation is in progress.",
        }
    }

    /// Whether the UI should stay quiet about it
    #[must_use]
    pub const fn is_silent(self) -> bool {
        matches!(self, Self::OperationPending | Self::NoWallet)
    }
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of an intent that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Ledger applied the transaction
    Confirmed(Confirmation),
    /// Nothing was sent
    Skipped(Precondition),
}

impl Outcome {
    #[inline]
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }

    #[inline]
    #[must_use]
    pub fn skipped(&self) -> Option<Precondition> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            Self::Confirmed(_) => None,
        }
    }
}

/// Packages intents into transactions and submits them
#[derive(Debug, Clone, Copy)]
pub struct TransactionSubmitter {
    deriver: AddressDeriver,
    confirm_timeout: Duration,
}

impl TransactionSubmitter {
    #[must_use]
    pub fn new(deriver: AddressDeriver, confirm_timeout: Duration) -> Self {
        Self {
            deriver,
            confirm_timeout,
        }
    }

    /// Check local preconditions against the cached view
    #[must_use]
    pub fn check(intent: &Intent, view: &ViewState) -> Option<Precondition> {
        match intent {
            Intent::InitUser => view.initialized.then_some(Precondition::AlreadyInitialized),
            Intent::AddTodo(content) => {
                if content.trim().is_empty() {
                    Some(Precondition::EmptyContent)
                } else if !view.initialized {
                    Some(Precondition::NotInitialized)
                } else {
                    None
                }
            }
            Intent::MarkTodo { sequence } => {
                if !view.initialized {
                    return Some(Precondition::NotInitialized);
                }
                match view.item_by_sequence(*sequence) {
                    None => Some(Precondition::UnknownTodo),
                    Some(item) if item.marked => Some(Precondition::AlreadyMarked),
                    Some(_) => None,
                }
            }
            Intent::RemoveTodo { sequence } => {
                if !view.initialized {
                    Some(Precondition::NotInitialized)
                } else if view.item_by_sequence(*sequence).is_none() {
                    Some(Precondition::UnknownTodo)
                } else {
                    None
                }
            }
        }
    }

    /// Build the unsigned transaction for `intent`
    ///
    /// The profile account is always included; add, mark and remove also
    /// carry the item account derived from the owner and sequence.
    ///
    /// # Errors
    /// `SessionError::AddressSpaceExhausted` when an add would need a
    /// sequence past the single-byte range.
    pub fn build(
        &self,
        intent: &Intent,
        authority: Address,
        view: &ViewState,
    ) -> Result<Transaction, SessionError> {
        let profile = self.deriver.profile_address(&authority)?;
        let (instruction, todo) = match intent {
            Intent::InitUser => (Instruction::InitializeUser, None),
            Intent::AddTodo(content) => {
                let todo = self
                    .deriver
                    .todo_address(&authority, u64::from(view.next_sequence))?;
                (
                    Instruction::AddTodo {
                        content: content.trim().to_string(),
                    },
                    Some(todo),
                )
            }
            Intent::MarkTodo { sequence } => (
                Instruction::MarkTodo {
                    sequence: *sequence,
                },
                Some(self.deriver.todo_address(&authority, u64::from(*sequence))?),
            ),
            Intent::RemoveTodo { sequence } => (
                Instruction::RemoveTodo {
                    sequence: *sequence,
                },
                Some(self.deriver.todo_address(&authority, u64::from(*sequence))?),
            ),
        };
        Ok(Transaction::new(
            instruction,
            AccountSet { profile, todo },
            authority,
        ))
    }

    /// Submit `intent` through `wallet`
    ///
    /// The caller must hold the pending-operation guard.
    ///
    /// # Errors
    /// `SessionError::Tx` on rejection, timeout or disconnection;
    /// `SessionError::AddressSpaceExhausted` before anything is sent when
    /// the owner has used every sequence.
    pub async fn submit(
        &self,
        intent: &Intent,
        wallet: &dyn Wallet,
        view: &ViewState,
    ) -> Result<Outcome, SessionError> {
        if !wallet.is_connected() {
            return Ok(Outcome::Skipped(Precondition::WalletDisconnected));
        }
        if let Some(reason) = Self::check(intent, view) {
            tracing::debug!(intent = intent.name(), %reason, "precondition not met");
            return Ok(Outcome::Skipped(reason));
        }

        let transaction = self.build(intent, wallet.identity(), view)?;
        tracing::info!(
            intent = intent.name(),
            accounts = ?transaction.accounts,
            "submitting transaction"
        );

        match tokio::time::timeout(self.confirm_timeout, wallet.sign_and_submit(transaction)).await
        {
            Ok(Ok(confirmation)) => {
                tracing::info!(
                    intent = intent.name(),
                    slot = confirmation.slot,
                    signature = %confirmation.signature,
                    "transaction confirmed"
                );
                Ok(Outcome::Confirmed(confirmation))
            }
            Ok(Err(err)) => Err(TxError::from(err).into()),
            Err(_) => Err(TxError::timed_out(
                u64::try_from(self.confirm_timeout.as_millis()).unwrap_or(u64::MAX),
            )
            .into()),
        }
    }
}
