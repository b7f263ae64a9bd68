#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the key derivation facility.

use proptest::prelude::*;
use qshield_core::kdf::{QShieldKdf, DOMAIN_KEM_COMBINE, DOMAIN_SESSION};

proptest! {
    /// Derivation with an explicit salt is deterministic and produces
    /// exactly the requested length.
    #[test]
    fn derive_is_deterministic(
        ikm in proptest::collection::vec(any::<u8>(), 1..128),
        salt in proptest::collection::vec(any::<u8>(), 0..64),
        info in proptest::collection::vec(any::<u8>(), 0..32),
        length in 1usize..256,
    ) {
        let kdf = QShieldKdf::default();
        let a = kdf.derive(&ikm, Some(&salt), &info, length).unwrap();
        let b = kdf.derive(&ikm, Some(&salt), &info, length).unwrap();
        prop_assert_eq!(a.expose(), b.expose());
        prop_assert_eq!(a.len(), length);
    }

    /// HKDF prefix property: a shorter output is a prefix of a longer
    /// one for the same inputs.
    #[test]
    fn shorter_output_is_prefix_of_longer(
        ikm in proptest::collection::vec(any::<u8>(), 1..64),
        salt in proptest::collection::vec(any::<u8>(), 0..32),
        short in 1usize..512,
        extra in 0usize..512,
    ) {
        let kdf = QShieldKdf::default();
        let long = short + extra;
        let short_key = kdf.derive(&ikm, Some(&salt), DOMAIN_SESSION, short).unwrap();
        let long_key = kdf.derive(&ikm, Some(&salt), DOMAIN_SESSION, long).unwrap();
        prop_assert_eq!(short_key.expose(), &long_key.expose()[..short]);
    }

    /// Combining is order-sensitive for distinct inputs.
    #[test]
    fn combine_is_order_sensitive(
        k1 in proptest::collection::vec(any::<u8>(), 1..64),
        k2 in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        prop_assume!(k1 != k2);
        let kdf = QShieldKdf::default();
        let ab = kdf.combine(&[&k1, &k2], DOMAIN_KEM_COMBINE, 32).unwrap();
        let ba = kdf.combine(&[&k2, &k1], DOMAIN_KEM_COMBINE, 32).unwrap();
        prop_assert_ne!(ab.expose(), ba.expose());
    }

    /// Combining one key differs from combining it with a second one.
    #[test]
    fn combine_input_count_matters(
        k1 in proptest::collection::vec(any::<u8>(), 1..64),
        k2 in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        let kdf = QShieldKdf::default();
        let one = kdf.combine(&[&k1], DOMAIN_KEM_COMBINE, 64).unwrap();
        let two = kdf.combine(&[&k1, &k2], DOMAIN_KEM_COMBINE, 64).unwrap();
        prop_assert_ne!(one.expose(), two.expose());
    }

    /// SHAKE-256 expansion is deterministic and honors the length.
    #[test]
    fn expand_is_deterministic(
        key in proptest::collection::vec(any::<u8>(), 1..64),
        info in proptest::collection::vec(any::<u8>(), 0..32),
        length in 1usize..2048,
    ) {
        let kdf = QShieldKdf::default();
        let a = kdf.expand(&key, &info, length).unwrap();
        let b = kdf.expand(&key, &info, length).unwrap();
        prop_assert_eq!(a.expose(), b.expose());
        prop_assert_eq!(a.len(), length);
    }

    /// Splitting a derived key partitions it without loss or overlap.
    #[test]
    fn split_partitions_the_key(
        ikm in proptest::collection::vec(any::<u8>(), 1..64),
        first in 1usize..32,
        second in 1usize..32,
    ) {
        let kdf = QShieldKdf::default();
        let total = first + second;
        let key = kdf.derive(&ikm, Some(b""), DOMAIN_SESSION, total).unwrap();
        let parts = key.split(&[first, second]).unwrap();
        prop_assert_eq!(parts.len(), 2);

        let mut reassembled = parts[0].expose().to_vec();
        reassembled.extend_from_slice(parts[1].expose());
        prop_assert_eq!(reassembled.as_slice(), key.expose());
    }
}
