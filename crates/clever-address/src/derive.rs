//! Deterministic record-address derivation
//!
//! Client and ledger agree on record identity by hashing the same seeds.
//! No lookup table is needed: the profile of an owner, and the item at a
//! given sequence, always live at the same address.

use crate::address::{Address, AddressError};
use sha2::{Digest, Sha256};

/// Namespace tag for the per-user profile record
pub const USER_TAG: &str = "USER_STATE";

/// Namespace tag for per-item records
pub const TODO_TAG: &str = "TODO_STATE";

/// Largest sequence number an item seed can carry (single byte)
pub const MAX_SEQUENCE: u8 = u8::MAX;

/// Number of items a single owner can ever create
pub const SEQUENCE_CAPACITY: u64 = MAX_SEQUENCE as u64 + 1;

/// Maximum length of one seed
pub const MAX_SEED_LEN: usize = 32;

const DERIVATION_MARKER: &[u8] = b"CleverTodoDerivedAddress";

/// Derives record addresses under a fixed program id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressDeriver {
    program_id: Address,
}

impl AddressDeriver {
    /// Create a deriver bound to `program_id`
    #[inline]
    #[must_use]
    pub const fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    /// Program id this deriver is bound to
    #[inline]
    #[must_use]
    pub const fn program_id(&self) -> Address {
        self.program_id
    }

    /// Derive an address from a namespace tag, an owner and optional extra seed
    ///
    /// Each seed is hashed with a length prefix, so `("ab", "c")` and
    /// `("a", "bc")` never collide.
    ///
    /// # Errors
    /// Returns `AddressError::SeedTooLong` if the tag or extra seed exceeds
    /// [`MAX_SEED_LEN`] bytes.
    pub fn derive(
        &self,
        namespace_tag: &str,
        owner: &Address,
        extra: Option<&[u8]>,
    ) -> Result<Address, AddressError> {
        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_MARKER);
        hasher.update(self.program_id.as_bytes());

        let seeds = [Some(namespace_tag.as_bytes()), Some(owner.as_bytes().as_slice()), extra];
        for seed in seeds.into_iter().flatten() {
            if seed.len() > MAX_SEED_LEN {
                return Err(AddressError::SeedTooLong {
                    len: seed.len(),
                    max: MAX_SEED_LEN,
                });
            }
            // Bounded by MAX_SEED_LEN above
            #[allow(clippy::cast_possible_truncation)]
            let len = seed.len() as u8;
            hasher.update([len]);
            hasher.update(seed);
        }

        Ok(Address::new(hasher.finalize().into()))
    }

    /// Address of the owner's profile record
    ///
    /// # Errors
    /// Never fails for the built-in tag; the `Result` mirrors [`Self::derive`].
    pub fn profile_address(&self, owner: &Address) -> Result<Address, AddressError> {
        let address = self.derive(USER_TAG, owner, None)?;
        tracing::trace!(owner = %owner.short(), address = %address.short(), "derived profile address");
        Ok(address)
    }

    /// Address of the owner's item at `sequence`
    ///
    /// # Errors
    /// Returns `AddressError::AddressSpaceExhausted` if `sequence` does not
    /// fit in a single byte. Values are never wrapped.
    pub fn todo_address(&self, owner: &Address, sequence: u64) -> Result<Address, AddressError> {
        let byte = u8::try_from(sequence).map_err(|_| AddressError::AddressSpaceExhausted {
            sequence,
            max: MAX_SEQUENCE,
        })?;
        let address = self.derive(TODO_TAG, owner, Some(&[byte]))?;
        tracing::trace!(owner = %owner.short(), sequence, address = %address.short(), "derived todo address");
        Ok(address)
    }
}
