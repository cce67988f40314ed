//! Clever Todo ledger seam
//!
//! Everything the session core needs to know about the outside world:
//!
//! - [`LedgerClient`]: fetch records, submit signed transactions
//! - [`Wallet`]: the authentication provider ("sign and submit")
//! - [`Instruction`] / [`Transaction`]: what a mutation looks like on the wire
//! - [`MemoryLedger`]: an in-process ledger that runs the todo program's rules
//!
//! # Example
//!
//! ```rust,ignore
//! use clever_ledger::{KeypairWallet, MemoryLedger, Wallet};
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(MemoryLedger::new(program_id));
//! let wallet = KeypairWallet::generate(ledger.clone());
//! let confirmation = wallet.sign_and_submit(transaction).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod client;
pub mod error;
pub mod memory;
pub mod record;
pub mod transaction;
pub mod wallet;

pub use client::{LedgerClient, Wallet};
pub use error::{LedgerError, ProgramError};
pub use memory::{LedgerStats, MemoryLedger};
pub use record::{Keyed, TodoFilter, TodoRecord, UserProfile};
pub use transaction::{
    AccountSet, Confirmation, Instruction, SignedTransaction, Transaction, TX_DOMAIN_PREFIX,
};
pub use wallet::KeypairWallet;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
