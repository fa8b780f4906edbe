//! Property-based tests for the route codec.

use crate::path::{decode_path, encode_path, FEE_LEN, HOP_LEN, TOKEN_LEN};
use crate::types::Address;
use proptest::collection::vec;
use proptest::prelude::*;

fn token() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::new)
}

fn fee() -> impl Strategy<Value = u32> {
    0u32..1 << 24
}

proptest! {
    /// decode ∘ encode is the identity for 2–5 hop routes.
    #[test]
    fn round_trip(
        tokens in vec(token(), 2..=6),
        fees in vec(fee(), 5),
    ) {
        let fees = &fees[..tokens.len() - 1];
        let bytes = encode_path(&tokens, fees).unwrap();
        prop_assert_eq!(bytes.len(), tokens.len() * TOKEN_LEN + fees.len() * FEE_LEN);

        let (decoded_tokens, decoded_fees) = decode_path(&bytes).unwrap();
        prop_assert_eq!(decoded_tokens, tokens);
        prop_assert_eq!(decoded_fees, fees.to_vec());
    }

    /// Only lengths of the form `23·n − 3`, `n ≥ 2`, decode.
    #[test]
    fn length_alone_decides_validity(len in 0usize..200) {
        let bytes = vec![0u8; len];
        let padded = len + FEE_LEN;
        let valid = padded % HOP_LEN == 0 && padded / HOP_LEN >= 2;
        prop_assert_eq!(decode_path(&bytes).is_ok(), valid);
    }
}
