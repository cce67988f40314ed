//! Clever Todo session core
//!
//! Keeps a local view of one user's todo list in step with the ledger and
//! routes every mutation through a signed, confirmed transaction.
//!
//! - [`StateFetcher`]: pulls the owner's profile and items
//! - [`TransactionSubmitter`]: intent -> transaction -> confirmation
//! - [`Reconciler`]: single writer of the observable [`ViewState`]
//! - [`PendingGuard`]: one mutating operation at a time
//! - [`TodoSession`]: the facade a UI drives
//!
//! # Example
//!
//! ```rust,ignore
//! use clever_session::prelude::*;
//!
//! let session = TodoSession::new(SessionConfig::default(), ledger)?;
//! session.set_wallet(Some(wallet)).await;
//! session.initialize_user().await?;
//! session.add_todo("buy milk").await?;
//!
//! let view = session.snapshot();
//! assert_eq!(view.incomplete_todos().count(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod fetcher;
pub mod guard;
pub mod notify;
pub mod reconciler;
pub mod session;
pub mod submitter;
pub mod view;

pub use config::{FetchFailurePolicy, SessionConfig, DEFAULT_PROGRAM_SEED};
pub use error::{ConfigError, ErrorClass, FetchError, SessionError, TxError, TxErrorKind};
pub use fetcher::{FetchResult, StateFetcher};
pub use guard::{GuardState, GuardStats, OperationPermit, PendingGuard};
pub use notify::{Notice, NoticeLevel, NotificationSink, TracingSink};
pub use reconciler::{reconcile, FetchTicket, LoadingScope, Reconciler};
pub use session::TodoSession;
pub use submitter::{Intent, Outcome, Precondition, TransactionSubmitter};
pub use view::{TodoItem, ViewState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Notice, NotificationSink, Outcome, Precondition, SessionConfig, SessionError,
        TodoItem, TodoSession, ViewState,
    };
}
