//! Clever Todo addresses
//!
//! Deterministic, collision-resistant record addresses shared by the
//! client and the ledger program.
//!
//! - [`Address`]: 32-byte identity / record location
//! - [`AddressDeriver`]: namespace + owner + optional sequence -> address
//!
//! # Example
//!
//! ```rust
//! use clever_address::{Address, AddressDeriver};
//!
//! let deriver = AddressDeriver::new(Address::hash_of(b"clever_todo"));
//! let owner = Address::hash_of(b"alice");
//!
//! let profile = deriver.profile_address(&owner).unwrap();
//! let first = deriver.todo_address(&owner, 0).unwrap();
//! assert_ne!(profile, first);
//! assert!(deriver.todo_address(&owner, 256).is_err());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod address;
mod derive;

pub use address::{Address, AddressError, ADDRESS_LEN};
pub use derive::{
    AddressDeriver, MAX_SEED_LEN, MAX_SEQUENCE, SEQUENCE_CAPACITY, TODO_TAG, USER_TAG,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
