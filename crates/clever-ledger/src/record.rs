//! Records stored by the todo program

use clever_address::Address;
use serde::{Deserialize, Serialize};

/// Per-user profile record
///
/// Lives at the address derived from `(USER_STATE, authority)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Owner of the profile
    pub authority: Address,
    /// Sequence the next added item will use; never reused
    pub next_sequence: u16,
    /// Live (not removed) items
    pub todo_count: u16,
}

impl UserProfile {
    /// Fresh profile for `authority`
    #[inline]
    #[must_use]
    pub const fn new(authority: Address) -> Self {
        Self {
            authority,
            next_sequence: 0,
            todo_count: 0,
        }
    }
}

/// One todo item record
///
/// Lives at the address derived from `(TODO_STATE, authority, [sequence])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub authority: Address,
    pub sequence: u8,
    pub content: String,
    pub marked: bool,
}

/// A record together with the address it was fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyed<T> {
    pub address: Address,
    pub record: T,
}

impl<T> Keyed<T> {
    #[inline]
    #[must_use]
    pub const fn new(address: Address, record: T) -> Self {
        Self { address, record }
    }
}

/// Server-side filter for item queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoFilter {
    /// Only records owned by this authority
    pub authority: Option<Address>,
}

impl TodoFilter {
    /// Every item record
    #[inline]
    #[must_use]
    pub const fn all() -> Self {
        Self { authority: None }
    }

    /// Records owned by `authority`
    #[inline]
    #[must_use]
    pub const fn by_authority(authority: Address) -> Self {
        Self {
            authority: Some(authority),
        }
    }

    /// Whether `record` passes the filter
    #[inline]
    #[must_use]
    pub fn matches(&self, record: &TodoRecord) -> bool {
        self.authority.map_or(true, |a| a == record.authority)
    }
}
