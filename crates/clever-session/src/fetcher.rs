//! Remote state fetcher
//!
//! Read-only and idempotent: safe to call repeatedly or concurrently.
//! A missing profile is a normal outcome (`initialized() == false`), not
//! an error.

use crate::error::FetchError;
use crate::view::TodoItem;
use clever_address::{Address, AddressDeriver};
use clever_ledger::{Keyed, LedgerClient, LedgerError, TodoFilter, TodoRecord, UserProfile};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Canonical state of one owner as seen by the ledger
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub profile: Option<Keyed<UserProfile>>,
    /// Owner's items only
    pub items: Vec<TodoItem>,
}

impl FetchResult {
    /// Result for an owner with no profile
    #[inline]
    #[must_use]
    pub fn uninitialized() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.profile.is_some()
    }

    /// Next sequence recorded in the profile (0 without one)
    #[inline]
    #[must_use]
    pub fn next_sequence(&self) -> u16 {
        self.profile.as_ref().map_or(0, |p| p.record.next_sequence)
    }
}

/// Pulls an owner's profile and items from the ledger
pub struct StateFetcher {
    ledger: Arc<dyn LedgerClient>,
    deriver: AddressDeriver,
    timeout: Duration,
}

impl StateFetcher {
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerClient>, deriver: AddressDeriver, timeout: Duration) -> Self {
        Self {
            ledger,
            deriver,
            timeout,
        }
    }

    /// Fetch `owner`'s profile and, if it exists, the owner's items
    ///
    /// Items are requested with an authority filter and checked again
    /// locally: any record owned by someone else, or stored at an address
    /// other than the one derived from its sequence, is discarded.
    ///
    /// # Errors
    /// `FetchError::Ledger` / `FetchError::Timeout` when the ledger cannot
    /// answer; `FetchError::ForeignProfile` if the profile names another
    /// authority.
    pub async fn fetch_state(&self, owner: &Address) -> Result<FetchResult, FetchError> {
        let profile_address = self.deriver.profile_address(owner)?;
        let profile = self
            .bounded(self.ledger.fetch_profile(&profile_address))
            .await?;

        let Some(profile) = profile else {
            tracing::debug!(owner = %owner.short(), "no profile record");
            return Ok(FetchResult::uninitialized());
        };
        if profile.record.authority != *owner {
            tracing::warn!(
                owner = %owner.short(),
                authority = %profile.record.authority.short(),
                "profile authority does not match owner"
            );
            return Err(FetchError::ForeignProfile);
        }

        let records = self
            .bounded(self.ledger.fetch_todos(&TodoFilter::by_authority(*owner)))
            .await?;
        let fetched = records.len();

        let items: Vec<TodoItem> = records
            .into_iter()
            .filter(|keyed| self.belongs_to(owner, keyed))
            .map(TodoItem::from)
            .collect();

        tracing::debug!(
            owner = %owner.short(),
            fetched,
            kept = items.len(),
            next_sequence = profile.record.next_sequence,
            "fetched state"
        );

        Ok(FetchResult {
            profile: Some(profile),
            items,
        })
    }

    fn belongs_to(&self, owner: &Address, keyed: &Keyed<TodoRecord>) -> bool {
        if keyed.record.authority != *owner {
            tracing::warn!(
                address = %keyed.address.short(),
                authority = %keyed.record.authority.short(),
                "discarding item owned by another identity"
            );
            return false;
        }
        let expected = self
            .deriver
            .todo_address(owner, u64::from(keyed.record.sequence));
        if !matches!(expected, Ok(address) if address == keyed.address) {
            tracing::warn!(
                address = %keyed.address.short(),
                sequence = keyed.record.sequence,
                "discarding item at non-derived address"
            );
            return false;
        }
        true
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, FetchError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(FetchError::from),
            Err(_) => Err(FetchError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl std::fmt::Debug for StateFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateFetcher")
            .field("deriver", &self.deriver)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
