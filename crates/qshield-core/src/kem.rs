//! Hybrid key encapsulation: X25519 + ML-KEM-768.
//!
//! This module provides:
//! - [`generate_keypair`] — generate a hybrid key pair
//! - [`encapsulate`] — derive a fresh shared secret for a recipient
//! - [`decapsulate`] — recover the shared secret from a ciphertext
//!
//! Both algorithms must be broken simultaneously to compromise the
//! shared secret: the X25519 and ML-KEM-768 outputs are combined with a
//! domain-separated HKDF, so if either primitive remains secure the
//! result stays indistinguishable from random.
//!
//! Without the `pq` feature the KEM runs X25519-only. The wire format
//! carries empty ML-KEM fields in that case, so classical-only and
//! hybrid deployments interoperate at a defined (classical) security
//! level: whenever either side lacks the ML-KEM component, both sides
//! combine over X25519 alone.

use crate::error::QShieldError;
use crate::kdf::{DerivedKey, QShieldKdf, DOMAIN_KEM_COMBINE};
use crate::memory::{SecretBuffer, SecretBytes};
use crate::wire;
use rand::rngs::OsRng;
#[cfg(feature = "pq")]
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

#[cfg(feature = "pq")]
use libcrux_ml_kem::mlkem768;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// X25519 public and private key length in bytes.
pub const X25519_KEY_SIZE: usize = 32;

/// ML-KEM-768 public key length in bytes (FIPS 203).
pub const ML_KEM_PUBLIC_KEY_LEN: usize = 1184;

/// ML-KEM-768 secret key length in bytes (FIPS 203).
pub const ML_KEM_SECRET_KEY_LEN: usize = 2400;

/// ML-KEM-768 ciphertext length in bytes (FIPS 203).
pub const ML_KEM_CIPHERTEXT_LEN: usize = 1088;

/// Combined shared secret length in bytes.
pub const QSHIELD_SHARED_SECRET_SIZE: usize = 64;

/// ML-KEM-768 key generation seed size (FIPS 203: d ‖ z).
#[cfg(feature = "pq")]
const ML_KEM_KEYGEN_SEED_LEN: usize = 64;

/// ML-KEM-768 encapsulation randomness size.
#[cfg(feature = "pq")]
const ML_KEM_ENCAPS_RAND_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Hybrid KEM public key.
///
/// Safe to transmit in the clear. `ml_kem` is empty when the key pair
/// was generated without post-quantum support.
///
/// Equality is byte-equality of the serialized form.
#[must_use = "public key must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemPublicKey {
    /// X25519 public key.
    pub x25519: [u8; X25519_KEY_SIZE],
    /// ML-KEM-768 public key, or empty in classical-only mode.
    pub ml_kem: Vec<u8>,
}

impl KemPublicKey {
    /// Serialize to the length-prefixed wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` if a field exceeds the `u32` length
    /// range (not reachable for real key material).
    pub fn to_bytes(&self) -> Result<Vec<u8>, QShieldError> {
        let mut out = Vec::new();
        wire::put_prefixed(&mut out, &self.x25519)?;
        wire::put_prefixed(&mut out, &self.ml_kem)?;
        Ok(out)
    }

    /// Deserialize from the wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` on truncated input or if the X25519
    /// component is not exactly 32 bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, QShieldError> {
        let mut cursor = 0usize;
        let x25519 = read_x25519_component(data, &mut cursor)?;
        let ml_kem = wire::read_prefixed(data, &mut cursor)?.to_vec();
        Ok(Self { x25519, ml_kem })
    }
}

/// Hybrid KEM secret key.
///
/// Both components live in zeroizing buffers and are scrubbed before
/// their storage is released. `Debug` output is masked, and there is no
/// serde support — use [`to_bytes`](Self::to_bytes) only toward sinks
/// the caller fully trusts.
#[must_use = "secret key must be stored"]
pub struct KemSecretKey {
    /// X25519 private key.
    pub(crate) x25519: SecretBytes<X25519_KEY_SIZE>,
    /// ML-KEM-768 secret key, or empty in classical-only mode.
    pub(crate) ml_kem: SecretBuffer,
}

impl std::fmt::Debug for KemSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KemSecretKey(***)")
    }
}

impl KemSecretKey {
    /// Serialize to the length-prefixed wire format.
    ///
    /// The output contains raw secret key material; the caller owns the
    /// buffer and is responsible for zeroizing it after use.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` if a field exceeds the `u32` length
    /// range (not reachable for real key material).
    pub fn to_bytes(&self) -> Result<Vec<u8>, QShieldError> {
        let mut out = Vec::new();
        wire::put_prefixed(&mut out, self.x25519.expose())?;
        wire::put_prefixed(&mut out, self.ml_kem.expose())?;
        Ok(out)
    }

    /// Deserialize from the wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` on truncated input or if the X25519
    /// component is not exactly 32 bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, QShieldError> {
        let mut cursor = 0usize;
        let mut x25519 = read_x25519_component(data, &mut cursor)?;
        let ml_kem_bytes = wire::read_prefixed(data, &mut cursor)?;
        let ml_kem = SecretBuffer::new(ml_kem_bytes)?;
        let key = Self {
            x25519: SecretBytes::new(x25519),
            ml_kem,
        };
        x25519.zeroize();
        Ok(key)
    }

    /// Derive the corresponding public key — **partially**.
    ///
    /// The X25519 public key is recomputed from the private scalar. The
    /// ML-KEM-768 public key cannot be recovered from the stored secret
    /// key alone, so the returned `ml_kem` field is empty; keep the
    /// public key from [`generate_keypair`] alongside the secret if the
    /// full hybrid public key is needed later.
    #[must_use]
    pub fn public_key(&self) -> KemPublicKey {
        let secret = x25519_dalek::StaticSecret::from(*self.x25519.expose());
        let public = x25519_dalek::PublicKey::from(&secret);
        KemPublicKey {
            x25519: public.to_bytes(),
            ml_kem: Vec::new(),
        }
    }
}

/// Hybrid KEM ciphertext: the sender's ephemeral X25519 public key plus
/// the ML-KEM-768 ciphertext. Non-secret, single-use.
#[must_use = "ciphertext must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KemCiphertext {
    /// Ephemeral X25519 public key.
    pub x25519: [u8; X25519_KEY_SIZE],
    /// ML-KEM-768 ciphertext, or empty when the encapsulation ran
    /// classical-only.
    pub ml_kem: Vec<u8>,
}

impl KemCiphertext {
    /// Serialize to the length-prefixed wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` if a field exceeds the `u32` length
    /// range (not reachable for real ciphertexts).
    pub fn to_bytes(&self) -> Result<Vec<u8>, QShieldError> {
        let mut out = Vec::new();
        wire::put_prefixed(&mut out, &self.x25519)?;
        wire::put_prefixed(&mut out, &self.ml_kem)?;
        Ok(out)
    }

    /// Deserialize from the wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` on truncated input or if the X25519
    /// component is not exactly 32 bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, QShieldError> {
        let mut cursor = 0usize;
        let x25519 = read_x25519_component(data, &mut cursor)?;
        let ml_kem = wire::read_prefixed(data, &mut cursor)?.to_vec();
        Ok(Self { x25519, ml_kem })
    }
}

/// Read a length-prefixed field that must be an X25519 key.
fn read_x25519_component(
    data: &[u8],
    cursor: &mut usize,
) -> Result<[u8; X25519_KEY_SIZE], QShieldError> {
    let field = wire::read_prefixed(data, cursor)?;
    field.try_into().map_err(|_| {
        QShieldError::Parse(format!(
            "X25519 component must be {X25519_KEY_SIZE} bytes, got {}",
            field.len()
        ))
    })
}

// ---------------------------------------------------------------------------
// Key generation
// ---------------------------------------------------------------------------

/// Generate a hybrid X25519 + ML-KEM-768 key pair.
///
/// Without the `pq` feature the ML-KEM fields are left empty and a
/// one-shot warning is printed to stderr.
///
/// # Errors
///
/// Returns `QShieldError::SecureMemory` if secret storage allocation
/// fails.
pub fn generate_keypair() -> Result<(KemPublicKey, KemSecretKey), QShieldError> {
    let x25519_secret = x25519_dalek::StaticSecret::random_from_rng(OsRng);
    let x25519_public = x25519_dalek::PublicKey::from(&x25519_secret);

    let mut x25519_sk_bytes = x25519_secret.to_bytes();
    let x25519_sk = SecretBytes::new(x25519_sk_bytes);
    x25519_sk_bytes.zeroize();
    // x25519_secret itself is zeroize-on-drop via the dalek "zeroize" feature.

    let (ml_kem_pub, ml_kem_sec) = generate_ml_kem_keypair()?;

    Ok((
        KemPublicKey {
            x25519: x25519_public.to_bytes(),
            ml_kem: ml_kem_pub,
        },
        KemSecretKey {
            x25519: x25519_sk,
            ml_kem: ml_kem_sec,
        },
    ))
}

#[cfg(feature = "pq")]
fn generate_ml_kem_keypair() -> Result<(Vec<u8>, SecretBuffer), QShieldError> {
    let mut seed = [0u8; ML_KEM_KEYGEN_SEED_LEN];
    OsRng.fill_bytes(&mut seed);

    let keypair = mlkem768::generate_key_pair(seed);
    seed.zeroize();

    let public: Vec<u8> = keypair.pk().to_vec();
    let secret = SecretBuffer::new(keypair.sk())?;
    Ok((public, secret))
}

#[cfg(not(feature = "pq"))]
fn generate_ml_kem_keypair() -> Result<(Vec<u8>, SecretBuffer), QShieldError> {
    crate::pq::warn_pq_unavailable("key encapsulation");
    Ok((Vec::new(), SecretBuffer::new(&[])?))
}

// ---------------------------------------------------------------------------
// Encapsulation
// ---------------------------------------------------------------------------

/// Encapsulate a fresh shared secret to a recipient's public key.
///
/// Performs ephemeral X25519 ECDH, and ML-KEM-768 encapsulation when the
/// recipient's key carries an ML-KEM component and the `pq` feature is
/// enabled; the sub-secrets are combined via HKDF with the KEM domain
/// tag. The returned secret is always exactly 64 bytes.
///
/// # Errors
///
/// Returns `QShieldError::KeyDerivation` if combining fails, or
/// `QShieldError::SecureMemory` if secret storage allocation fails.
pub fn encapsulate(public_key: &KemPublicKey) -> Result<(KemCiphertext, DerivedKey), QShieldError> {
    let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);

    let peer = x25519_dalek::PublicKey::from(public_key.x25519);
    let x25519_shared = ephemeral.diffie_hellman(&peer);
    // The ephemeral secret is consumed by diffie_hellman and zeroized.

    let (ml_kem_ct, shared) = encapsulate_ml_kem(public_key, x25519_shared.as_bytes())?;

    Ok((
        KemCiphertext {
            x25519: ephemeral_public.to_bytes(),
            ml_kem: ml_kem_ct,
        },
        shared,
    ))
}

#[cfg(feature = "pq")]
fn encapsulate_ml_kem(
    public_key: &KemPublicKey,
    x25519_ss: &[u8; X25519_KEY_SIZE],
) -> Result<(Vec<u8>, DerivedKey), QShieldError> {
    if !public_key.ml_kem.is_empty() {
        if let Ok(ml_kem_pk) = mlkem768::MlKem768PublicKey::try_from(public_key.ml_kem.as_slice())
        {
            if mlkem768::validate_public_key(&ml_kem_pk) {
                let mut randomness = [0u8; ML_KEM_ENCAPS_RAND_LEN];
                OsRng.fill_bytes(&mut randomness);
                let (ct, mut ml_kem_ss) = mlkem768::encapsulate(&ml_kem_pk, randomness);
                randomness.zeroize();

                let shared = combine_shared(x25519_ss, Some(&ml_kem_ss));
                ml_kem_ss.zeroize();
                return Ok((ct.as_ref().to_vec(), shared?));
            }
        }
        // Unusable ML-KEM material degrades to the classical-only path;
        // the mismatch surfaces downstream as a different shared secret.
    }
    Ok((Vec::new(), combine_shared(x25519_ss, None)?))
}

#[cfg(not(feature = "pq"))]
fn encapsulate_ml_kem(
    _public_key: &KemPublicKey,
    x25519_ss: &[u8; X25519_KEY_SIZE],
) -> Result<(Vec<u8>, DerivedKey), QShieldError> {
    Ok((Vec::new(), combine_shared(x25519_ss, None)?))
}

// ---------------------------------------------------------------------------
// Decapsulation
// ---------------------------------------------------------------------------

/// Recover the shared secret from a ciphertext.
///
/// Mismatched keys, tampered ciphertexts, or a PQ/non-PQ component
/// mismatch all yield a *different* pseudo-random 64-byte secret rather
/// than an error (ML-KEM implicit rejection); the authenticated cipher
/// built on top is what detects misuse.
///
/// # Errors
///
/// Returns `QShieldError::KeyDerivation` if combining fails, or
/// `QShieldError::SecureMemory` if secret storage allocation fails.
pub fn decapsulate(
    secret_key: &KemSecretKey,
    ciphertext: &KemCiphertext,
) -> Result<DerivedKey, QShieldError> {
    let mut sk_bytes = *secret_key.x25519.expose();
    let x25519_secret = x25519_dalek::StaticSecret::from(sk_bytes);
    sk_bytes.zeroize();

    let peer_ephemeral = x25519_dalek::PublicKey::from(ciphertext.x25519);
    let x25519_shared = x25519_secret.diffie_hellman(&peer_ephemeral);

    decapsulate_ml_kem(secret_key, ciphertext, x25519_shared.as_bytes())
}

#[cfg(feature = "pq")]
fn decapsulate_ml_kem(
    secret_key: &KemSecretKey,
    ciphertext: &KemCiphertext,
    x25519_ss: &[u8; X25519_KEY_SIZE],
) -> Result<DerivedKey, QShieldError> {
    if !secret_key.ml_kem.is_empty() && !ciphertext.ml_kem.is_empty() {
        let parsed_sk = mlkem768::MlKem768PrivateKey::try_from(secret_key.ml_kem.expose());
        let parsed_ct = mlkem768::MlKem768Ciphertext::try_from(ciphertext.ml_kem.as_slice());
        if let (Ok(ml_kem_sk), Ok(ml_kem_ct)) = (parsed_sk, parsed_ct) {
            let mut ml_kem_ss = mlkem768::decapsulate(&ml_kem_sk, &ml_kem_ct);
            let shared = combine_shared(x25519_ss, Some(&ml_kem_ss));
            ml_kem_ss.zeroize();
            return shared;
        }
        // Wrong-length ML-KEM material: fall through to the classical
        // combine, which cannot match the sender's secret.
    }
    combine_shared(x25519_ss, None)
}

#[cfg(not(feature = "pq"))]
fn decapsulate_ml_kem(
    _secret_key: &KemSecretKey,
    _ciphertext: &KemCiphertext,
    x25519_ss: &[u8; X25519_KEY_SIZE],
) -> Result<DerivedKey, QShieldError> {
    combine_shared(x25519_ss, None)
}

/// Returns the combined shared secret size in bytes.
#[must_use]
pub const fn shared_secret_size() -> usize {
    QSHIELD_SHARED_SECRET_SIZE
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Combine the X25519 shared secret with an optional ML-KEM shared
/// secret via the KDF, with the KEM domain tag.
fn combine_shared(
    x25519_ss: &[u8; X25519_KEY_SIZE],
    ml_kem_ss: Option<&[u8; 32]>,
) -> Result<DerivedKey, QShieldError> {
    let kdf = QShieldKdf::default();
    match ml_kem_ss {
        Some(ml) => kdf.combine(
            &[x25519_ss.as_slice(), ml.as_slice()],
            DOMAIN_KEM_COMBINE,
            QSHIELD_SHARED_SECRET_SIZE,
        ),
        None => kdf.combine(
            &[x25519_ss.as_slice()],
            DOMAIN_KEM_COMBINE,
            QSHIELD_SHARED_SECRET_SIZE,
        ),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
