//! `qshield-core` — QuantumShield cryptographic primitives.
//!
//! Hybrid post-quantum cryptography with defense-in-depth. Every
//! primitive pairs a classical algorithm with a post-quantum one, so
//! breaking either still leaves the other protecting the data:
//!
//! - **KEM** ([`kem`]): X25519 + ML-KEM-768 key encapsulation
//! - **Signatures** ([`sign`](mod@sign)): ML-DSA-65 + Ed25519 dual signatures
//! - **Cipher** ([`CascadeCipher`]): AES-256-GCM cascaded with
//!   ChaCha20-Poly1305
//! - **KDF** ([`QShieldKdf`]): HKDF-SHA-512, SHAKE-256 expansion,
//!   Argon2id password derivation
//!
//! This crate is the audit target: zero network, zero async, zero UI
//! dependencies. Secret material lives in zeroizing, mlock'd buffers.
//!
//! The post-quantum algorithms sit behind the `pq` cargo feature
//! (enabled by default). Without it the library runs classical-only —
//! X25519 KEM and dual Ed25519 signatures — and warns on stderr at key
//! generation; check [`pq_available`] where post-quantum protection is
//! a hard requirement.
//!
//! # Quick start
//!
//! ```
//! use qshield_core::{kem, CascadeCipher};
//!
//! // Generate a key pair and establish a shared secret.
//! let (public_key, secret_key) = kem::generate_keypair()?;
//! let (ciphertext, shared_secret) = kem::encapsulate(&public_key)?;
//! let decapsulated = kem::decapsulate(&secret_key, &ciphertext)?;
//! assert!(shared_secret.ct_eq(&decapsulated));
//!
//! // Bulk encryption under the shared secret.
//! let cipher = CascadeCipher::new(shared_secret.expose())?;
//! let encrypted = cipher.encrypt(b"Hello, quantum world!")?;
//! assert_eq!(cipher.decrypt(&encrypted)?, b"Hello, quantum world!");
//! # Ok::<(), qshield_core::QShieldError>(())
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

mod wire;

pub mod kdf;

pub mod cipher;

pub mod kem;

pub mod sign;

pub mod pq;

pub use cipher::{
    CascadeCipher, AES_KEY_SIZE, AES_NONCE_SIZE, AES_TAG_SIZE, CHACHA_KEY_SIZE, CHACHA_NONCE_SIZE,
    CHACHA_TAG_SIZE, QSHIELD_KEY_SIZE, QSHIELD_OVERHEAD,
};
pub use error::QShieldError;
pub use kdf::{
    generate_salt, DerivedKey, KdfConfig, QShieldKdf, DOMAIN_ENCRYPTION, DOMAIN_HANDSHAKE,
    DOMAIN_KEM_COMBINE, DOMAIN_PASSWORD, DOMAIN_SESSION, DOMAIN_SIGNING,
};
pub use kem::{
    decapsulate, encapsulate, generate_keypair, shared_secret_size, KemCiphertext, KemPublicKey,
    KemSecretKey, QSHIELD_SHARED_SECRET_SIZE,
};
pub use memory::{disable_core_dumps, locking_degraded, SecretBuffer, SecretBytes};
pub use pq::pq_available;
pub use sign::{
    generate_signing_keypair, sign, sign_with_timestamp, verify, DualSignature, SignPublicKey,
    SignSecretKey, SignatureScheme,
};
