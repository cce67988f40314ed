//! Error types for the ledger seam
//!
//! [`LedgerError`] is what a remote call can fail with; [`ProgramError`] is
//! the reason the todo program gave when it processed and declined a
//! transaction.

/// Errors returned by ledger and wallet calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Network or service unreachable
    #[error("transport failure: {0}")]
    Transport(String),

    /// No response within the allotted time
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Wallet or connection is not available
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Program processed the transaction and declined it
    #[error("transaction rejected: {0}")]
    Rejected(#[from] ProgramError),

    /// Signer refused to sign the transaction
    #[error("signature request rejected: {0}")]
    SignatureRejected(String),

    /// Transaction could not be encoded for signing
    #[error("encoding failed: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Whether the ledger never saw the request
    #[inline]
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Disconnected(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Reasons the todo program declines a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ProgramError {
    /// Signer is not the record's authority
    #[error("You are not authorized to perform this action.")]
    Unauthorized,

    /// Operation not permitted
    #[error("Not allowed.")]
    NotAllowed,

    /// Checked counter arithmetic failed
    #[error("Math operation overflow.")]
    MathOverflow,

    /// Item is already marked
    #[error("Todo is already marked.")]
    AlreadyMarked,

    /// Target record already exists
    #[error("account already in use")]
    AccountAlreadyInUse,

    /// Target record does not exist
    #[error("account not initialized")]
    AccountNotInitialized,

    /// Passed account does not match the derived address
    #[error("a seeds constraint was violated")]
    ConstraintSeeds,

    /// Signature does not verify against the authority
    #[error("invalid transaction signature")]
    InvalidSignature,
}

impl ProgramError {
    /// Numeric error code as reported by the ledger
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::AccountAlreadyInUse => 0,
            Self::InvalidSignature => 1,
            Self::ConstraintSeeds => 2006,
            Self::AccountNotInitialized => 3012,
            Self::Unauthorized => 6000,
            Self::NotAllowed => 6001,
            Self::MathOverflow => 6002,
            Self::AlreadyMarked => 6003,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_error_display() {
        let err = LedgerError::Rejected(ProgramError::AlreadyMarked);
        assert!(err.to_string().contains("Todo is already marked."));
    }

    #[test]
    fn ledger_error_is_transport() {
        assert!(LedgerError::Transport("down".into()).is_transport());
        assert!(LedgerError::Timeout("slow".into()).is_transport());
        assert!(LedgerError::Disconnected("gone".into()).is_transport());
        assert!(!LedgerError::Rejected(ProgramError::Unauthorized).is_transport());
    }

    #[test]
    fn program_error_codes_follow_custom_range() {
        assert_eq!(ProgramError::Unauthorized.code(), 6000);
        assert_eq!(ProgramError::AlreadyMarked.code(), 6003);
        assert!(ProgramError::ConstraintSeeds.code() < 6000);
    }
}
