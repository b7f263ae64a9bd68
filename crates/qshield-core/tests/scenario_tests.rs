#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end scenarios across the four components.

use qshield_core::kdf::{KdfConfig, QShieldKdf, DOMAIN_KEM_COMBINE};
use qshield_core::sign::{self, DualSignature};
use qshield_core::{kem, CascadeCipher, QShieldError};

/// Ciphertext length is plaintext length plus the fixed 56-byte
/// overhead, and decryption restores the plaintext.
#[test]
fn cipher_ciphertext_length_is_deterministic() {
    let cipher = CascadeCipher::new(b"this is a test shared secret for encryption")
        .expect("cipher should build");
    let plaintext = b"Hello, quantum world!";
    assert_eq!(plaintext.len(), 21);

    let ciphertext = cipher.encrypt(plaintext).expect("encrypt should succeed");
    assert_eq!(ciphertext.len(), 77);
    assert_eq!(cipher.decrypt(&ciphertext).expect("decrypt"), plaintext);
}

/// Fresh nonces per call: identical plaintexts produce different
/// ciphertexts that both decrypt correctly.
#[test]
fn cipher_encryption_is_randomized() {
    let cipher = CascadeCipher::new(b"this is a test shared secret for encryption")
        .expect("cipher should build");
    let first = cipher.encrypt(b"Hello!").expect("encrypt should succeed");
    let second = cipher.encrypt(b"Hello!").expect("encrypt should succeed");

    assert_ne!(first, second);
    assert_eq!(cipher.decrypt(&first).expect("decrypt"), b"Hello!");
    assert_eq!(cipher.decrypt(&second).expect("decrypt"), b"Hello!");
}

/// Key rotation isolates past traffic: phase-1 ciphertexts become
/// undecryptable while phase-2 traffic works.
#[test]
fn cipher_key_rotation_isolates_phases() {
    let mut cipher = CascadeCipher::new(b"rotation scenario secret").expect("cipher should build");
    let phase1 = cipher.encrypt(b"phase 1").expect("encrypt should succeed");

    cipher.rotate_keys().expect("rotation should succeed");
    let phase2 = cipher.encrypt(b"phase 2").expect("encrypt should succeed");

    assert!(matches!(cipher.decrypt(&phase1), Err(QShieldError::Decryption)));
    assert_eq!(cipher.decrypt(&phase2).expect("decrypt"), b"phase 2");
}

/// KEM agreement feeds two interoperable ciphers.
#[test]
fn kem_shared_secret_drives_cipher_channel() {
    let (public, secret) = kem::generate_keypair().expect("keygen should succeed");
    let (ciphertext, ss_sender) = kem::encapsulate(&public).expect("encapsulate should succeed");
    let ss_receiver = kem::decapsulate(&secret, &ciphertext).expect("decapsulate should succeed");
    assert!(ss_sender.ct_eq(&ss_receiver));

    let sender = CascadeCipher::new(ss_sender.expose()).expect("cipher should build");
    let receiver = CascadeCipher::new(ss_receiver.expose()).expect("cipher should build");
    let encrypted = sender.encrypt(b"secret").expect("encrypt should succeed");
    assert_eq!(receiver.decrypt(&encrypted).expect("decrypt"), b"secret");
}

/// Timestamped signature: verifies, rejects a one-letter message edit,
/// and survives wire serialization.
#[test]
fn timestamped_signature_scenario() {
    let (public, secret) = sign::generate_signing_keypair().expect("keygen should succeed");
    let signature = sign::sign_with_timestamp(&secret, b"Hello!", Some(1_704_067_200))
        .expect("signing should succeed");

    assert!(sign::verify(&public, b"Hello!", &signature));
    assert!(!sign::verify(&public, b"Hella!", &signature));

    let bytes = signature.to_bytes().expect("serialize should succeed");
    let restored = DualSignature::from_bytes(&bytes).expect("deserialize should succeed");
    assert_eq!(restored.timestamp, Some(1_704_067_200));
    assert!(sign::verify(&public, b"Hello!", &restored));
}

/// Combining keys is order-sensitive.
#[test]
fn combine_ordering_scenario() {
    let kdf = QShieldKdf::default();
    let forward = kdf
        .combine(&[b"key-1", b"key-2"], DOMAIN_KEM_COMBINE, 32)
        .expect("combine should succeed");
    let reversed = kdf
        .combine(&[b"key-2", b"key-1"], DOMAIN_KEM_COMBINE, 32)
        .expect("combine should succeed");
    assert_ne!(forward.expose(), reversed.expose());
}

/// Full two-party exchange: Bob publishes a key, Alice encapsulates and
/// both sides run bidirectional encrypted traffic over the agreed
/// secret.
#[test]
fn two_party_key_exchange() {
    // Bob generates his key pair and publishes the public half.
    let (bob_public, bob_secret) = kem::generate_keypair().expect("keygen should succeed");
    let published = bob_public.to_bytes().expect("serialize should succeed");

    // Alice encapsulates to the published key.
    let alice_view = kem::KemPublicKey::from_bytes(&published).expect("parse should succeed");
    let (kem_ct, alice_ss) = kem::encapsulate(&alice_view).expect("encapsulate should succeed");

    // Bob decapsulates the transmitted ciphertext.
    let transmitted = kem_ct.to_bytes().expect("serialize should succeed");
    let bob_ct = kem::KemCiphertext::from_bytes(&transmitted).expect("parse should succeed");
    let bob_ss = kem::decapsulate(&bob_secret, &bob_ct).expect("decapsulate should succeed");

    // Bidirectional traffic.
    let alice_cipher = CascadeCipher::new(alice_ss.expose()).expect("cipher should build");
    let bob_cipher = CascadeCipher::new(bob_ss.expose()).expect("cipher should build");

    let to_bob = alice_cipher
        .encrypt(b"Hello, Bob! This is quantum-secure.")
        .expect("encrypt should succeed");
    assert_eq!(
        bob_cipher.decrypt(&to_bob).expect("decrypt"),
        b"Hello, Bob! This is quantum-secure."
    );

    let to_alice = bob_cipher
        .encrypt(b"Hi Alice! Message received.")
        .expect("encrypt should succeed");
    assert_eq!(
        alice_cipher.decrypt(&to_alice).expect("decrypt"),
        b"Hi Alice! Message received."
    );
}

/// A password-derived key can seed the cipher directly.
#[test]
fn password_derived_cipher_channel() {
    // Small Argon2id costs keep the test fast.
    let kdf = QShieldKdf::new(KdfConfig {
        memory_cost: 32,
        time_cost: 1,
        parallelism: 1,
    });
    let salt = qshield_core::generate_salt(32);

    let key_a = kdf
        .derive_from_password(b"correct horse battery staple", &salt, 64)
        .expect("derivation should succeed");
    let key_b = kdf
        .derive_from_password(b"correct horse battery staple", &salt, 64)
        .expect("derivation should succeed");
    assert!(key_a.ct_eq(&key_b));

    let writer = CascadeCipher::new(key_a.expose()).expect("cipher should build");
    let reader = CascadeCipher::new(key_b.expose()).expect("cipher should build");
    let sealed = writer.seal(b"vault payload").expect("seal should succeed");
    assert_eq!(reader.open(&sealed).expect("open"), b"vault payload");
}

/// Signed key distribution: a signing key authenticates a KEM public
/// key, and the receiver checks the signature before encapsulating.
#[test]
fn signed_kem_public_key_distribution() {
    let (sign_public, sign_secret) = sign::generate_signing_keypair().expect("keygen");
    let (kem_public, kem_secret) = kem::generate_keypair().expect("keygen");

    let kem_public_bytes = kem_public.to_bytes().expect("serialize should succeed");
    let signature = sign::sign(&sign_secret, &kem_public_bytes).expect("signing should succeed");

    // Receiver verifies the key before using it.
    assert!(sign::verify(&sign_public, &kem_public_bytes, &signature));
    let verified_key =
        kem::KemPublicKey::from_bytes(&kem_public_bytes).expect("parse should succeed");
    let (ciphertext, ss_sender) = kem::encapsulate(&verified_key).expect("encapsulate");
    let ss_receiver = kem::decapsulate(&kem_secret, &ciphertext).expect("decapsulate");
    assert!(ss_sender.ct_eq(&ss_receiver));

    // A tampered key does not verify.
    let mut forged = kem_public_bytes.clone();
    forged[10] ^= 0x01;
    assert!(!sign::verify(&sign_public, &forged, &signature));
}

/// The capability probe matches the compiled feature set.
#[test]
fn pq_probe_matches_build() {
    assert_eq!(qshield_core::pq_available(), cfg!(feature = "pq"));
}
