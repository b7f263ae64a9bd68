//! Dual digital signatures: ML-DSA-65 + Ed25519.
//!
//! This module provides:
//! - [`generate_signing_keypair`] — generate a dual signing key pair
//! - [`sign`] / [`sign_with_timestamp`] — produce both sub-signatures
//!   over a domain-separated message hash
//! - [`verify`] — `true` iff *both* sub-signatures verify
//!
//! With the `pq` feature the primary signer is ML-DSA-65 and the
//! secondary is Ed25519. Without it, two *independent* Ed25519 key
//! pairs are used instead (the [`SignatureScheme::Classical`] mode) and
//! a one-shot warning is printed at key generation.
//!
//! Messages are never handed to the signers directly: both sub-signers
//! sign a SHA3-256 pre-hash that binds a domain tag, the message
//! length, and — for timestamped signatures — the timestamp. Timestamp
//! *policy* (freshness windows etc.) is the caller's concern; this
//! module only binds the value into the signed hash.

use crate::error::QShieldError;
use crate::memory::SecretBuffer;
use crate::wire;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroize;

#[cfg(feature = "pq")]
use libcrux_ml_dsa::ml_dsa_65;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Ed25519 public key length in bytes.
pub const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 seed (private key) length in bytes.
pub const ED25519_SEED_LEN: usize = 32;

/// Ed25519 signature length in bytes.
pub const ED25519_SIGNATURE_LEN: usize = 64;

/// ML-DSA-65 verification key length in bytes (FIPS 204).
pub const ML_DSA_VERIFICATION_KEY_LEN: usize = 1952;

/// ML-DSA-65 signing key length in bytes (FIPS 204).
pub const ML_DSA_SIGNING_KEY_LEN: usize = 4032;

/// ML-DSA-65 signature length in bytes (FIPS 204).
pub const ML_DSA_SIGNATURE_LEN: usize = 3309;

/// ML-DSA-65 key generation / signing randomness size.
#[cfg(feature = "pq")]
const ML_DSA_RAND_LEN: usize = 32;

/// ML-DSA context parameter. Domain separation is carried by the
/// SHA3-256 pre-hash tags, so the context stays empty.
#[cfg(feature = "pq")]
const ML_DSA_CONTEXT: &[u8] = b"";

/// Pre-hash domain tag for plain signatures.
const HASH_DOMAIN: &[u8] = b"QShieldSign-v1";

/// Pre-hash domain tag for timestamped signatures.
const HASH_TS_DOMAIN: &[u8] = b"QShieldSign-ts-v1";

/// Fingerprint domain tag.
const FINGERPRINT_DOMAIN: &[u8] = b"QShieldSign-fingerprint-v1";

/// Signature wire-format flag: timestamp present.
const FLAG_TIMESTAMP: u16 = 0x0001;

// ---------------------------------------------------------------------------
// Scheme
// ---------------------------------------------------------------------------

/// Algorithm combination of a signing key or signature.
///
/// A signature only verifies against a public key of the *same* scheme;
/// a mismatch fails verification before any cryptography runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// Primary ML-DSA-65, secondary Ed25519.
    #[serde(rename = "pq")]
    PostQuantum,
    /// Two independent Ed25519 key pairs.
    #[serde(rename = "classical")]
    Classical,
}

impl SignatureScheme {
    /// Wire-format name of the scheme.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PostQuantum => "pq",
            Self::Classical => "classical",
        }
    }

    /// Parse a wire-format scheme name.
    fn from_wire(bytes: &[u8]) -> Result<Self, QShieldError> {
        match bytes {
            b"pq" => Ok(Self::PostQuantum),
            b"classical" => Ok(Self::Classical),
            other => Err(QShieldError::Parse(format!(
                "unknown signature scheme: {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

impl std::fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Dual-signature public key.
///
/// Equality is byte-equality of the serialized form. Safe to distribute;
/// compare out-of-band via [`fingerprint`](Self::fingerprint).
#[must_use = "public key must be stored or published"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignPublicKey {
    /// Primary verification key (ML-DSA-65 in PQ mode, Ed25519 in
    /// classical mode).
    pub primary: Vec<u8>,
    /// Secondary verification key (always Ed25519).
    pub secondary: Vec<u8>,
    /// Algorithm combination.
    pub scheme: SignatureScheme,
}

impl SignPublicKey {
    /// Serialize to the length-prefixed wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` if a field exceeds the `u32` length
    /// range (not reachable for real key material).
    pub fn to_bytes(&self) -> Result<Vec<u8>, QShieldError> {
        let mut out = Vec::new();
        wire::put_prefixed(&mut out, self.scheme.as_str().as_bytes())?;
        wire::put_prefixed(&mut out, &self.primary)?;
        wire::put_prefixed(&mut out, &self.secondary)?;
        Ok(out)
    }

    /// Deserialize from the wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` on truncated input or an unknown
    /// scheme name.
    pub fn from_bytes(data: &[u8]) -> Result<Self, QShieldError> {
        let mut cursor = 0usize;
        let scheme = SignatureScheme::from_wire(wire::read_prefixed(data, &mut cursor)?)?;
        let primary = wire::read_prefixed(data, &mut cursor)?.to_vec();
        let secondary = wire::read_prefixed(data, &mut cursor)?.to_vec();
        Ok(Self {
            primary,
            secondary,
            scheme,
        })
    }

    /// SHA3-256 fingerprint over both verification keys, for
    /// out-of-band comparison.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        use sha3::{Digest, Sha3_256};
        let mut hasher = Sha3_256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        hasher.update(&self.primary);
        hasher.update(&self.secondary);
        hasher.finalize().into()
    }
}

/// Dual-signature secret key.
///
/// Both signing keys live in zeroizing buffers; `Debug` output is
/// masked and there is no serde support.
#[must_use = "secret key must be stored"]
pub struct SignSecretKey {
    /// Primary signing key (ML-DSA-65 in PQ mode, an Ed25519 seed in
    /// classical mode).
    pub(crate) primary: SecretBuffer,
    /// Secondary signing key (always an Ed25519 seed).
    pub(crate) secondary: SecretBuffer,
    /// Algorithm combination.
    pub scheme: SignatureScheme,
}

impl std::fmt::Debug for SignSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignSecretKey(***)")
    }
}

impl SignSecretKey {
    /// Serialize to the length-prefixed wire format.
    ///
    /// The output contains raw signing key material; the caller owns the
    /// buffer and is responsible for zeroizing it after use.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` if a field exceeds the `u32` length
    /// range (not reachable for real key material).
    pub fn to_bytes(&self) -> Result<Vec<u8>, QShieldError> {
        let mut out = Vec::new();
        wire::put_prefixed(&mut out, self.scheme.as_str().as_bytes())?;
        wire::put_prefixed(&mut out, self.primary.expose())?;
        wire::put_prefixed(&mut out, self.secondary.expose())?;
        Ok(out)
    }

    /// Deserialize from the wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` on truncated input or an unknown
    /// scheme name.
    pub fn from_bytes(data: &[u8]) -> Result<Self, QShieldError> {
        let mut cursor = 0usize;
        let scheme = SignatureScheme::from_wire(wire::read_prefixed(data, &mut cursor)?)?;
        let primary = SecretBuffer::new(wire::read_prefixed(data, &mut cursor)?)?;
        let secondary = SecretBuffer::new(wire::read_prefixed(data, &mut cursor)?)?;
        Ok(Self {
            primary,
            secondary,
            scheme,
        })
    }
}

/// Combined dual signature, with an optional timestamp bound into the
/// signed hash.
#[must_use = "signature must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DualSignature {
    /// Primary signature bytes.
    pub primary: Vec<u8>,
    /// Secondary signature bytes.
    pub secondary: Vec<u8>,
    /// Algorithm combination; must match the verifying public key.
    pub scheme: SignatureScheme,
    /// Unix timestamp (seconds) bound into the signed hash, if any.
    pub timestamp: Option<u64>,
}

impl DualSignature {
    /// Serialize to the wire format: `u16` flags, scheme, both
    /// signatures, and the trailing timestamp when flag bit 0 is set.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` if a field exceeds the `u32` length
    /// range (not reachable for real signatures).
    pub fn to_bytes(&self) -> Result<Vec<u8>, QShieldError> {
        let flags: u16 = if self.timestamp.is_some() {
            FLAG_TIMESTAMP
        } else {
            0
        };
        let mut out = Vec::new();
        out.extend_from_slice(&flags.to_le_bytes());
        wire::put_prefixed(&mut out, self.scheme.as_str().as_bytes())?;
        wire::put_prefixed(&mut out, &self.primary)?;
        wire::put_prefixed(&mut out, &self.secondary)?;
        if let Some(ts) = self.timestamp {
            out.extend_from_slice(&ts.to_le_bytes());
        }
        Ok(out)
    }

    /// Deserialize from the wire format.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Parse` on truncated input, an unknown
    /// scheme name, or reserved flag bits being set.
    pub fn from_bytes(data: &[u8]) -> Result<Self, QShieldError> {
        let mut cursor = 0usize;
        let flags = wire::read_u16_le(data, &mut cursor)?;
        if flags & !FLAG_TIMESTAMP != 0 {
            return Err(QShieldError::Parse(format!(
                "reserved signature flag bits set: {flags:#06x}"
            )));
        }
        let scheme = SignatureScheme::from_wire(wire::read_prefixed(data, &mut cursor)?)?;
        let primary = wire::read_prefixed(data, &mut cursor)?.to_vec();
        let secondary = wire::read_prefixed(data, &mut cursor)?.to_vec();
        let timestamp = if flags & FLAG_TIMESTAMP != 0 {
            Some(wire::read_u64_le(data, &mut cursor)?)
        } else {
            None
        };
        Ok(Self {
            primary,
            secondary,
            scheme,
            timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Message pre-hashing
// ---------------------------------------------------------------------------

fn hash_message(message: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    let mut hasher = Sha3_256::new();
    hasher.update(HASH_DOMAIN);
    hasher.update((message.len() as u64).to_le_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

fn hash_message_with_timestamp(message: &[u8], timestamp: u64) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    let mut hasher = Sha3_256::new();
    hasher.update(HASH_TS_DOMAIN);
    hasher.update(timestamp.to_le_bytes());
    hasher.update((message.len() as u64).to_le_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// Key generation
// ---------------------------------------------------------------------------

/// Generate a dual signing key pair.
///
/// With the `pq` feature: primary ML-DSA-65, secondary Ed25519
/// ([`SignatureScheme::PostQuantum`]). Without it: two independent
/// Ed25519 key pairs ([`SignatureScheme::Classical`]) and a one-shot
/// warning on stderr.
///
/// # Errors
///
/// Returns `QShieldError::Signature` if key generation fails, or
/// `QShieldError::SecureMemory` if secret storage allocation fails.
pub fn generate_signing_keypair() -> Result<(SignPublicKey, SignSecretKey), QShieldError> {
    #[cfg(feature = "pq")]
    {
        generate_pq_keypair()
    }
    #[cfg(not(feature = "pq"))]
    {
        crate::pq::warn_pq_unavailable("signing");
        generate_classical_keypair()
    }
}

#[cfg(feature = "pq")]
fn generate_pq_keypair() -> Result<(SignPublicKey, SignSecretKey), QShieldError> {
    let mut keygen_rand = [0u8; ML_DSA_RAND_LEN];
    OsRng.fill_bytes(&mut keygen_rand);
    let ml_dsa_keypair = ml_dsa_65::generate_key_pair(keygen_rand);
    keygen_rand.zeroize();

    let primary_public = ml_dsa_keypair.verification_key.as_ref().to_vec();
    let primary_secret = SecretBuffer::new(ml_dsa_keypair.signing_key.as_slice())?;

    let (ed25519_public, ed25519_seed) = generate_ed25519()?;

    Ok((
        SignPublicKey {
            primary: primary_public,
            secondary: ed25519_public.to_vec(),
            scheme: SignatureScheme::PostQuantum,
        },
        SignSecretKey {
            primary: primary_secret,
            secondary: ed25519_seed,
            scheme: SignatureScheme::PostQuantum,
        },
    ))
}

/// Classical fallback: two independent Ed25519 key pairs.
#[cfg_attr(feature = "pq", allow(dead_code))]
fn generate_classical_keypair() -> Result<(SignPublicKey, SignSecretKey), QShieldError> {
    let (primary_public, primary_seed) = generate_ed25519()?;
    let (secondary_public, secondary_seed) = generate_ed25519()?;

    Ok((
        SignPublicKey {
            primary: primary_public.to_vec(),
            secondary: secondary_public.to_vec(),
            scheme: SignatureScheme::Classical,
        },
        SignSecretKey {
            primary: primary_seed,
            secondary: secondary_seed,
            scheme: SignatureScheme::Classical,
        },
    ))
}

/// Generate one Ed25519 key pair, returning the public key and the seed
/// in secure storage.
fn generate_ed25519() -> Result<([u8; ED25519_PUBLIC_KEY_LEN], SecretBuffer), QShieldError> {
    let mut seed = [0u8; ED25519_SEED_LEN];
    OsRng.fill_bytes(&mut seed);

    let keypair = Ed25519KeyPair::from_seed_unchecked(&seed).map_err(|e| {
        QShieldError::Signature(format!("Ed25519 key generation failed: {e}"))
    })?;

    let mut public = [0u8; ED25519_PUBLIC_KEY_LEN];
    public.copy_from_slice(keypair.public_key().as_ref());

    let seed_buffer = SecretBuffer::new(&seed)?;
    seed.zeroize();
    Ok((public, seed_buffer))
}

// ---------------------------------------------------------------------------
// Sign
// ---------------------------------------------------------------------------

/// Sign a message with both algorithms.
///
/// # Errors
///
/// Returns `QShieldError::Signature` if either sub-signer fails, or if
/// the key's scheme is [`SignatureScheme::PostQuantum`] and the `pq`
/// feature is not compiled in.
pub fn sign(secret_key: &SignSecretKey, message: &[u8]) -> Result<DualSignature, QShieldError> {
    let digest = hash_message(message);
    sign_digest(secret_key, &digest, None)
}

/// Sign a message with both algorithms and a timestamp bound into the
/// signed hash.
///
/// `timestamp` is Unix seconds; `None` uses the current time.
///
/// # Errors
///
/// Same as [`sign`].
pub fn sign_with_timestamp(
    secret_key: &SignSecretKey,
    message: &[u8],
    timestamp: Option<u64>,
) -> Result<DualSignature, QShieldError> {
    let ts = timestamp.unwrap_or_else(current_unix_time);
    let digest = hash_message_with_timestamp(message, ts);
    sign_digest(secret_key, &digest, Some(ts))
}

fn current_unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn sign_digest(
    secret_key: &SignSecretKey,
    digest: &[u8; 32],
    timestamp: Option<u64>,
) -> Result<DualSignature, QShieldError> {
    match secret_key.scheme {
        SignatureScheme::Classical => {
            let primary = ed25519_sign(secret_key.primary.expose(), digest)?;
            let secondary = ed25519_sign(secret_key.secondary.expose(), digest)?;
            Ok(DualSignature {
                primary,
                secondary,
                scheme: SignatureScheme::Classical,
                timestamp,
            })
        }
        SignatureScheme::PostQuantum => sign_digest_pq(secret_key, digest, timestamp),
    }
}

#[cfg(feature = "pq")]
fn sign_digest_pq(
    secret_key: &SignSecretKey,
    digest: &[u8; 32],
    timestamp: Option<u64>,
) -> Result<DualSignature, QShieldError> {
    let signing_key = ml_dsa_65::MLDSA65SigningKey::new(
        secret_key
            .primary
            .expose()
            .try_into()
            .map_err(|_| QShieldError::Signature("ML-DSA signing key has invalid length".into()))?,
    );

    let mut sign_rand = [0u8; ML_DSA_RAND_LEN];
    OsRng.fill_bytes(&mut sign_rand);
    let result = ml_dsa_65::sign(&signing_key, digest, ML_DSA_CONTEXT, sign_rand);
    sign_rand.zeroize();
    let ml_dsa_sig = result
        .map_err(|e| QShieldError::Signature(format!("ML-DSA signing failed: {e:?}")))?;

    let secondary = ed25519_sign(secret_key.secondary.expose(), digest)?;

    Ok(DualSignature {
        primary: ml_dsa_sig.as_ref().to_vec(),
        secondary,
        scheme: SignatureScheme::PostQuantum,
        timestamp,
    })
}

#[cfg(not(feature = "pq"))]
fn sign_digest_pq(
    _secret_key: &SignSecretKey,
    _digest: &[u8; 32],
    _timestamp: Option<u64>,
) -> Result<DualSignature, QShieldError> {
    Err(QShieldError::Signature(
        "cannot sign with a post-quantum key: the `pq` feature is not compiled in".into(),
    ))
}

fn ed25519_sign(seed: &[u8], digest: &[u8]) -> Result<Vec<u8>, QShieldError> {
    let keypair = Ed25519KeyPair::from_seed_unchecked(seed).map_err(|e| {
        QShieldError::Signature(format!("Ed25519 key reconstruction failed: {e}"))
    })?;
    Ok(keypair.sign(digest).as_ref().to_vec())
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

/// Verify a dual signature.
///
/// Returns `true` iff the signature's scheme matches the public key's
/// scheme *and* both sub-signatures verify over the recomputed message
/// hash (using the signature's timestamp when present). Never errors;
/// any failure — including a post-quantum signature verified by a build
/// without the `pq` feature — yields `false`.
#[must_use]
pub fn verify(public_key: &SignPublicKey, message: &[u8], signature: &DualSignature) -> bool {
    if public_key.scheme != signature.scheme {
        return false;
    }

    let digest = match signature.timestamp {
        Some(ts) => hash_message_with_timestamp(message, ts),
        None => hash_message(message),
    };

    match public_key.scheme {
        SignatureScheme::Classical => {
            ed25519_verify(&public_key.primary, &signature.primary, &digest)
                && ed25519_verify(&public_key.secondary, &signature.secondary, &digest)
        }
        SignatureScheme::PostQuantum => verify_pq(public_key, &digest, signature),
    }
}

#[cfg(feature = "pq")]
fn verify_pq(public_key: &SignPublicKey, digest: &[u8; 32], signature: &DualSignature) -> bool {
    let Ok(vk_bytes) =
        <&[u8; ML_DSA_VERIFICATION_KEY_LEN]>::try_from(public_key.primary.as_slice())
    else {
        return false;
    };
    let verification_key = ml_dsa_65::MLDSA65VerificationKey::new(*vk_bytes);

    let Ok(sig_bytes) = <&[u8; ML_DSA_SIGNATURE_LEN]>::try_from(signature.primary.as_slice())
    else {
        return false;
    };
    let ml_dsa_sig = ml_dsa_65::MLDSA65Signature::new(*sig_bytes);

    if ml_dsa_65::verify(&verification_key, digest, ML_DSA_CONTEXT, &ml_dsa_sig).is_err() {
        return false;
    }

    ed25519_verify(&public_key.secondary, &signature.secondary, digest)
}

#[cfg(not(feature = "pq"))]
fn verify_pq(_public_key: &SignPublicKey, _digest: &[u8; 32], _signature: &DualSignature) -> bool {
    false
}

fn ed25519_verify(public_key: &[u8], sig: &[u8], digest: &[u8]) -> bool {
    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(digest, sig)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
