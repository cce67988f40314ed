//! Error types for the session core
//!
//! Classifies every way an operation can end short of a confirmation:
//! - Local preconditions (never reach the ledger)
//! - Transport failures (ledger unreachable, timeouts, disconnected wallet)
//! - Remote rejections (the program declined the transaction)
//! - Exhausted item address space

use clever_address::AddressError;
use clever_ledger::{LedgerError, ProgramError};
use std::fmt;

/// Main session error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Submission failed
    #[error("transaction failed: {0}")]
    Tx(#[from] TxError),

    /// Fetch failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Owner already used every item sequence
    #[error("address space exhausted: sequence {sequence} exceeds {max}")]
    AddressSpaceExhausted { sequence: u64, max: u8 },

    /// Any other local derivation failure
    #[error("address error: {0}")]
    Address(AddressError),
}

impl From<AddressError> for SessionError {
    fn from(err: AddressError) -> Self {
        match err {
            AddressError::AddressSpaceExhausted { sequence, max } => {
                Self::AddressSpaceExhausted { sequence, max }
            }
            other => Self::Address(other),
        }
    }
}

impl SessionError {
    /// Taxonomy class of this error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Tx(tx) => match tx.kind {
                TxErrorKind::Rejected => ErrorClass::RemoteRejection,
                TxErrorKind::Timeout | TxErrorKind::Disconnected => ErrorClass::TransportFailure,
            },
            Self::Fetch(_) => ErrorClass::TransportFailure,
            Self::AddressSpaceExhausted { .. } => ErrorClass::AddressSpaceExhausted,
            Self::Address(_) => ErrorClass::PreconditionFailure,
        }
    }

    /// Check if retrying the same operation can succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::TransportFailure
    }

    /// A transaction was sent but its fate is unknown
    #[inline]
    #[must_use]
    pub fn is_unconfirmed(&self) -> bool {
        matches!(self, Self::Tx(tx) if tx.kind == TxErrorKind::Timeout)
    }
}

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Local check failed; nothing was sent
    PreconditionFailure,
    /// Network or service unreachable
    TransportFailure,
    /// Service processed the request and declined it
    RemoteRejection,
    /// Sequence domain overflow
    AddressSpaceExhausted,
}

/// Failure kind of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxErrorKind {
    /// Declined by the program or the signer
    Rejected,
    /// No confirmation in time
    Timeout,
    /// Wallet or ledger unreachable
    Disconnected,
}

impl fmt::Display for TxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "rejected"),
            Self::Timeout => write!(f, "timeout"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Submission error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TxError {
    pub kind: TxErrorKind,
    pub message: String,
    /// Program reason, when the program itself declined
    pub program_error: Option<ProgramError>,
}

impl TxError {
    #[inline]
    #[must_use]
    pub fn new(kind: TxErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            program_error: None,
        }
    }

    /// Submission did not confirm within `timeout_ms`
    #[inline]
    #[must_use]
    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::new(
            TxErrorKind::Timeout,
            format!("no confirmation within {timeout_ms} ms"),
        )
    }
}

impl From<LedgerError> for TxError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::Rejected(reason) => Self {
                kind: TxErrorKind::Rejected,
                message,
                program_error: Some(reason),
            },
            LedgerError::SignatureRejected(_) | LedgerError::Encoding(_) => {
                Self::new(TxErrorKind::Rejected, message)
            }
            LedgerError::Timeout(_) => Self::new(TxErrorKind::Timeout, message),
            LedgerError::Transport(_) | LedgerError::Disconnected(_) => {
                Self::new(TxErrorKind::Disconnected, message)
            }
        }
    }
}

/// Fetch error
///
/// Distinct from "record not found", which is a normal fetch outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Ledger call failed
    #[error("ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    /// No response in time
    #[error("fetch timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Profile at the owner's address names another authority
    #[error("profile ownership mismatch")]
    ForeignProfile,

    /// Profile address could not be derived
    #[error("address error: {0}")]
    Address(#[from] AddressError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config text is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values are out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}
