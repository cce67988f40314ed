//! Local view state
//!
//! Everything the UI reads. `items` is a cache of the ledger; the two
//! partitions are computed from it on demand and never stored.

use clever_address::Address;
use clever_ledger::{Keyed, TodoRecord};
use serde::Serialize;

/// Cached copy of one item record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodoItem {
    /// Derived record address
    pub address: Address,
    pub owner: Address,
    pub sequence: u8,
    pub content: String,
    pub marked: bool,
}

impl From<Keyed<TodoRecord>> for TodoItem {
    fn from(keyed: Keyed<TodoRecord>) -> Self {
        Self {
            address: keyed.address,
            owner: keyed.record.authority,
            sequence: keyed.record.sequence,
            content: keyed.record.content,
            marked: keyed.record.marked,
        }
    }
}

/// Observable session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewState {
    /// Identity this view belongs to
    pub owner: Option<Address>,
    /// A profile exists for the owner
    pub initialized: bool,
    /// Sequence the next add will use
    pub next_sequence: u16,
    /// Items in fetch order
    pub items: Vec<TodoItem>,
    /// A mutating operation is in flight
    pub pending_operation: bool,
    /// A fetch is in flight
    pub loading: bool,
    /// The last refresh failed; `items` may be out of date
    pub stale: bool,
    /// Text the user is typing for the next add
    pub draft_input: String,
}

impl ViewState {
    /// Empty view for `owner`
    #[must_use]
    pub fn for_owner(owner: Option<Address>) -> Self {
        Self {
            owner,
            ..Self::default()
        }
    }

    /// Items not yet marked
    pub fn incomplete_todos(&self) -> impl Iterator<Item = &TodoItem> {
        self.items.iter().filter(|t| !t.marked)
    }

    /// Marked items
    pub fn completed_todos(&self) -> impl Iterator<Item = &TodoItem> {
        self.items.iter().filter(|t| t.marked)
    }

    /// Cached item at `address`
    #[must_use]
    pub fn item(&self, address: &Address) -> Option<&TodoItem> {
        self.items.iter().find(|t| &t.address == address)
    }

    /// Cached item with `sequence`
    #[must_use]
    pub fn item_by_sequence(&self, sequence: u8) -> Option<&TodoItem> {
        self.items.iter().find(|t| t.sequence == sequence)
    }
}
