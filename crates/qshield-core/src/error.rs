//! Error types for `qshield-core`.

use thiserror::Error;

/// Errors produced by QuantumShield cryptographic operations.
///
/// The taxonomy is deliberately flat. Signature *verification* never
/// produces an error — it returns `false` — and the post-quantum-
/// unavailable condition is a warning, not an error (see
/// [`crate::pq::pq_available`]).
#[derive(Debug, Error)]
pub enum QShieldError {
    /// Key material is malformed, or zero-length where that is disallowed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Symmetric encryption failure.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed — ciphertext tampered, wrong
    /// key, or wrong AAD. Carries no detail: all tag-mismatch causes are
    /// indistinguishable to the caller.
    #[error("decryption failed: authentication tag mismatch")]
    Decryption,

    /// Ciphertext is too short or structurally impossible.
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// HKDF or Argon2id failure, or a key split larger than available.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Signing-side failure (key generation or signing).
    #[error("signature error: {0}")]
    Signature(String),

    /// Deserialization of a wire-format object failed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Secure memory allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
