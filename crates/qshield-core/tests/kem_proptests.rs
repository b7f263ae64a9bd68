#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the hybrid KEM.

use proptest::prelude::*;
use qshield_core::{kem, CascadeCipher};
use std::sync::OnceLock;

/// One hybrid key pair shared across properties — key generation is the
/// expensive part and the properties quantify over the other inputs.
fn keypair() -> &'static (kem::KemPublicKey, kem::KemSecretKey) {
    static KEYPAIR: OnceLock<(kem::KemPublicKey, kem::KemSecretKey)> = OnceLock::new();
    KEYPAIR.get_or_init(|| kem::generate_keypair().expect("keygen should succeed"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Every encapsulation decapsulates to the same 64-byte secret.
    #[test]
    fn encapsulation_always_roundtrips(_round in any::<u8>()) {
        let (public, secret) = keypair();
        let (ciphertext, ss_enc) = kem::encapsulate(public).unwrap();
        let ss_dec = kem::decapsulate(secret, &ciphertext).unwrap();
        prop_assert!(ss_enc.ct_eq(&ss_dec));
        prop_assert_eq!(ss_enc.len(), kem::QSHIELD_SHARED_SECRET_SIZE);
    }

    /// The shared secret drives a working cipher channel end to end.
    #[test]
    fn shared_secret_feeds_cipher(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let (public, secret) = keypair();
        let (ciphertext, ss_sender) = kem::encapsulate(public).unwrap();
        let ss_receiver = kem::decapsulate(secret, &ciphertext).unwrap();

        let sender = CascadeCipher::new(ss_sender.expose()).unwrap();
        let receiver = CascadeCipher::new(ss_receiver.expose()).unwrap();
        let encrypted = sender.encrypt(&plaintext).unwrap();
        prop_assert_eq!(receiver.decrypt(&encrypted).unwrap(), plaintext);
    }

    /// Tampering with the ephemeral X25519 component always changes the
    /// decapsulated secret — never an error.
    #[test]
    fn x25519_tampering_changes_secret(
        byte in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let (public, secret) = keypair();
        let (mut ciphertext, ss_enc) = kem::encapsulate(public).unwrap();
        let index = byte.index(ciphertext.x25519.len());
        ciphertext.x25519[index] ^= mask;

        let ss_tampered = kem::decapsulate(secret, &ciphertext).unwrap();
        prop_assert!(!ss_enc.ct_eq(&ss_tampered));
        prop_assert_eq!(ss_tampered.len(), kem::QSHIELD_SHARED_SECRET_SIZE);
    }
}

#[cfg(feature = "pq")]
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Tampering with the ML-KEM ciphertext triggers implicit rejection:
    /// a different secret, no error.
    #[test]
    fn ml_kem_tampering_changes_secret(
        byte in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let (public, secret) = keypair();
        let (mut ciphertext, ss_enc) = kem::encapsulate(public).unwrap();
        let index = byte.index(ciphertext.ml_kem.len());
        ciphertext.ml_kem[index] ^= mask;

        let ss_tampered = kem::decapsulate(secret, &ciphertext).unwrap();
        prop_assert!(!ss_enc.ct_eq(&ss_tampered));
    }
}
