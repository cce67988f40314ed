use clever_address::{Address, AddressDeriver, AddressError, SEQUENCE_CAPACITY};
use proptest::prelude::*;

fn arb_address() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>().prop_map(Address::new)
}

proptest! {
    #[test]
    fn prop_derive_is_deterministic(
        program in arb_address(),
        owner in arb_address(),
        tag in "[A-Z_]{1,32}",
        extra in proptest::option::of(proptest::collection::vec(any::<u8>(), 0..=32)),
    ) {
        let deriver = AddressDeriver::new(program);
        let first = deriver.derive(&tag, &owner, extra.as_deref()).unwrap();
        let second = deriver.derive(&tag, &owner, extra.as_deref()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_distinct_sequences_never_collide(
        owner in arb_address(),
        a in 0u64..SEQUENCE_CAPACITY,
        b in 0u64..SEQUENCE_CAPACITY,
    ) {
        prop_assume!(a != b);
        let deriver = AddressDeriver::new(Address::hash_of(b"clever_todo"));
        prop_assert_ne!(
            deriver.todo_address(&owner, a).unwrap(),
            deriver.todo_address(&owner, b).unwrap()
        );
    }

    #[test]
    fn prop_sequences_past_capacity_are_rejected(
        owner in arb_address(),
        sequence in SEQUENCE_CAPACITY..u64::MAX,
    ) {
        let deriver = AddressDeriver::new(Address::hash_of(b"clever_todo"));
        let is_exhausted = matches!(
            deriver.todo_address(&owner, sequence),
            Err(AddressError::AddressSpaceExhausted { .. })
        );
        prop_assert!(is_exhausted);
    }
}
