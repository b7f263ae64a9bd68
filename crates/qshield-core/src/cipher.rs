//! Cascading authenticated encryption: AES-256-GCM then ChaCha20-Poly1305.
//!
//! This module provides:
//! - [`CascadeCipher`] — two-layer AEAD over a shared secret
//! - The exported size constants ([`QSHIELD_OVERHEAD`] etc.)
//!
//! Plaintext is encrypted first with AES-256-GCM, and the resulting
//! `nonce ‖ ciphertext ‖ tag` blob is encrypted again with
//! ChaCha20-Poly1305. The two ciphers rest on different mathematical
//! foundations (substitution-permutation vs ARX), so a break in either
//! one still leaves the data protected. Layer keys are derived
//! independently from the shared secret via HKDF.

use crate::error::QShieldError;
use crate::kdf::QShieldKdf;
use crate::memory::SecretBytes;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::Zeroize;

// --- Exported constants ---

/// AES-256 key length in bytes.
pub const AES_KEY_SIZE: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const AES_NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const AES_TAG_SIZE: usize = 16;

/// ChaCha20 key length in bytes.
pub const CHACHA_KEY_SIZE: usize = 32;

/// IETF ChaCha20-Poly1305 nonce length in bytes.
pub const CHACHA_NONCE_SIZE: usize = 12;

/// Poly1305 authentication tag length in bytes.
pub const CHACHA_TAG_SIZE: usize = 16;

/// Total derived key material for both layers (64 bytes).
pub const QSHIELD_KEY_SIZE: usize = AES_KEY_SIZE + CHACHA_KEY_SIZE;

/// Ciphertext overhead in bytes: two nonces and two tags.
pub const QSHIELD_OVERHEAD: usize =
    AES_NONCE_SIZE + AES_TAG_SIZE + CHACHA_NONCE_SIZE + CHACHA_TAG_SIZE;

/// HKDF info for deriving the two layer keys from a shared secret.
const CASCADE_INFO: &[u8] = b"QuantumShield-cascade-v1";

/// HKDF info for key rotation.
const ROTATE_INFO: &[u8] = b"QuantumShield-rotate-v1";

// ---------------------------------------------------------------------------
// CascadeCipher
// ---------------------------------------------------------------------------

/// Cascading symmetric cipher over AES-256-GCM and ChaCha20-Poly1305.
///
/// Both layer keys live in zeroizing buffers and are scrubbed on drop
/// and on [`rotate_keys`](Self::rotate_keys). All operations except
/// rotation take `&self`, so a shared instance is safe to use from
/// multiple threads.
///
/// # Example
///
/// ```
/// use qshield_core::CascadeCipher;
///
/// let cipher = CascadeCipher::new(b"shared secret from the KEM")?;
/// let ciphertext = cipher.encrypt(b"plaintext")?;
/// assert_eq!(cipher.decrypt(&ciphertext)?, b"plaintext");
/// # Ok::<(), qshield_core::QShieldError>(())
/// ```
pub struct CascadeCipher {
    aes_key: SecretBytes<AES_KEY_SIZE>,
    chacha_key: SecretBytes<CHACHA_KEY_SIZE>,
}

impl std::fmt::Debug for CascadeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CascadeCipher(***)")
    }
}

impl CascadeCipher {
    /// Create a cipher from a shared secret of any non-empty length.
    ///
    /// 64 bytes are derived from the secret via HKDF with the cascade
    /// domain tag and split into the AES and ChaCha keys.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::InvalidKey` if the shared secret is empty,
    /// or `QShieldError::KeyDerivation` if derivation fails.
    pub fn new(shared_secret: &[u8]) -> Result<Self, QShieldError> {
        if shared_secret.is_empty() {
            return Err(QShieldError::InvalidKey(
                "shared secret must not be empty".into(),
            ));
        }

        let kdf = QShieldKdf::default();
        // Empty salt: the shared secret already carries the entropy.
        let derived = kdf.derive(shared_secret, Some(b""), CASCADE_INFO, QSHIELD_KEY_SIZE)?;
        Ok(Self::from_key_material(derived.expose()))
    }

    /// Split 64 bytes of derived material into the two layer keys.
    fn from_key_material(material: &[u8]) -> Self {
        let mut aes_key = [0u8; AES_KEY_SIZE];
        aes_key.copy_from_slice(&material[..AES_KEY_SIZE]);
        let mut chacha_key = [0u8; CHACHA_KEY_SIZE];
        chacha_key.copy_from_slice(&material[AES_KEY_SIZE..QSHIELD_KEY_SIZE]);
        Self {
            aes_key: SecretBytes::new(aes_key),
            chacha_key: SecretBytes::new(chacha_key),
        }
    }

    // ------------------------------------------------------------------
    // Encrypt / decrypt
    // ------------------------------------------------------------------

    /// Encrypt plaintext through both layers (no AAD).
    ///
    /// Each layer draws a fresh random 96-bit nonce, so encrypting the
    /// same plaintext twice yields different ciphertexts. Output length
    /// is always `plaintext.len() + 56`.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Encryption` if either AEAD fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, QShieldError> {
        self.encrypt_with_aad(plaintext, &[])
    }

    /// Decrypt a cascaded ciphertext (no AAD).
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::InvalidCiphertext` if the input is shorter
    /// than [`QSHIELD_OVERHEAD`], or `QShieldError::Decryption` if
    /// authentication fails at either layer.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, QShieldError> {
        self.decrypt_with_aad(ciphertext, &[])
    }

    /// Encrypt plaintext with additional authenticated data.
    ///
    /// The AAD is authenticated (not encrypted) at both layers, and the
    /// same AAD must be supplied to decrypt.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Encryption` if either AEAD fails.
    pub fn encrypt_with_aad(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, QShieldError> {
        // Layer 1: AES-256-GCM.
        let aes = less_safe_key(&aead::AES_256_GCM, self.aes_key.expose())?;
        let mut aes_nonce = [0u8; AES_NONCE_SIZE];
        OsRng.fill_bytes(&mut aes_nonce);

        let mut in_out = plaintext.to_vec();
        let Ok(aes_tag) = aes.seal_in_place_separate_tag(
            aead::Nonce::assume_unique_for_key(aes_nonce),
            aead::Aad::from(aad),
            &mut in_out,
        ) else {
            in_out.zeroize();
            return Err(QShieldError::Encryption("AES-256-GCM layer failed".into()));
        };

        let inner_capacity = AES_NONCE_SIZE
            .saturating_add(in_out.len())
            .saturating_add(AES_TAG_SIZE);
        let mut inner = Vec::with_capacity(inner_capacity);
        inner.extend_from_slice(&aes_nonce);
        inner.extend_from_slice(&in_out);
        inner.extend_from_slice(aes_tag.as_ref());

        // Layer 2: ChaCha20-Poly1305 over the serialized inner layer.
        let chacha = less_safe_key(&aead::CHACHA20_POLY1305, self.chacha_key.expose())?;
        let mut chacha_nonce = [0u8; CHACHA_NONCE_SIZE];
        OsRng.fill_bytes(&mut chacha_nonce);

        let chacha_tag = chacha
            .seal_in_place_separate_tag(
                aead::Nonce::assume_unique_for_key(chacha_nonce),
                aead::Aad::from(aad),
                &mut inner,
            )
            .map_err(|_| QShieldError::Encryption("ChaCha20-Poly1305 layer failed".into()))?;

        let out_capacity = CHACHA_NONCE_SIZE
            .saturating_add(inner.len())
            .saturating_add(CHACHA_TAG_SIZE);
        let mut out = Vec::with_capacity(out_capacity);
        out.extend_from_slice(&chacha_nonce);
        out.extend_from_slice(&inner);
        out.extend_from_slice(chacha_tag.as_ref());
        Ok(out)
    }

    /// Decrypt a cascaded ciphertext with additional authenticated data.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::InvalidCiphertext` if the input is shorter
    /// than [`QSHIELD_OVERHEAD`], or `QShieldError::Decryption` on any
    /// authentication failure (wrong key, wrong AAD, tampered data) —
    /// the causes are indistinguishable.
    pub fn decrypt_with_aad(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, QShieldError> {
        if ciphertext.len() < QSHIELD_OVERHEAD {
            return Err(QShieldError::InvalidCiphertext(format!(
                "ciphertext too short: {} bytes, need at least {QSHIELD_OVERHEAD}",
                ciphertext.len()
            )));
        }

        // Strip the ChaCha20 layer.
        let (chacha_nonce, chacha_ct) = ciphertext.split_at(CHACHA_NONCE_SIZE);
        let chacha = less_safe_key(&aead::CHACHA20_POLY1305, self.chacha_key.expose())?;
        let mut inner = chacha_ct.to_vec();
        let inner_plain = chacha
            .open_in_place(
                nonce_from_slice(chacha_nonce)?,
                aead::Aad::from(aad),
                &mut inner,
            )
            .map_err(|_| QShieldError::Decryption)?;

        // Strip the AES layer. The outer length check guarantees the
        // inner blob holds at least a nonce and a tag.
        let (aes_nonce, aes_ct) = inner_plain.split_at(AES_NONCE_SIZE);
        let aes = less_safe_key(&aead::AES_256_GCM, self.aes_key.expose())?;
        let mut in_out = aes_ct.to_vec();
        let plaintext = aes
            .open_in_place(nonce_from_slice(aes_nonce)?, aead::Aad::from(aad), &mut in_out)
            .map_err(|_| QShieldError::Decryption)?;

        let result = plaintext.to_vec();
        in_out.zeroize();
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Convenience wrappers
    // ------------------------------------------------------------------

    /// Encrypt into a sealed ciphertext (alias for [`encrypt`](Self::encrypt)).
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::Encryption` if either AEAD fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, QShieldError> {
        self.encrypt(plaintext)
    }

    /// Decrypt a sealed ciphertext (alias for [`decrypt`](Self::decrypt)).
    ///
    /// # Errors
    ///
    /// Same as [`decrypt`](Self::decrypt).
    pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, QShieldError> {
        self.decrypt(ciphertext)
    }

    /// Encryption overhead in bytes (nonce + tag for each layer).
    #[must_use]
    pub const fn overhead() -> usize {
        QSHIELD_OVERHEAD
    }

    // ------------------------------------------------------------------
    // Key rotation (forward secrecy)
    // ------------------------------------------------------------------

    /// Rotate to new keys derived from the current state.
    ///
    /// New keys are derived from the concatenated current keys with a
    /// fresh random salt; the old keys and the intermediate material are
    /// zeroized. Ciphertexts produced under the old keys can no longer
    /// be decrypted.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::KeyDerivation` if derivation fails; the
    /// current keys are left in place in that case.
    pub fn rotate_keys(&mut self) -> Result<(), QShieldError> {
        let mut ikm = [0u8; QSHIELD_KEY_SIZE];
        ikm[..AES_KEY_SIZE].copy_from_slice(self.aes_key.expose());
        ikm[AES_KEY_SIZE..].copy_from_slice(self.chacha_key.expose());

        let kdf = QShieldKdf::default();
        let derived = kdf.derive(&ikm, None, ROTATE_INFO, QSHIELD_KEY_SIZE);
        ikm.zeroize();
        let derived = derived?;

        // Old SecretBytes are zeroized as they are dropped by the swap.
        *self = Self::from_key_material(derived.expose());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ring plumbing
// ---------------------------------------------------------------------------

fn less_safe_key(
    algorithm: &'static aead::Algorithm,
    key: &[u8],
) -> Result<aead::LessSafeKey, QShieldError> {
    let unbound = aead::UnboundKey::new(algorithm, key)
        .map_err(|_| QShieldError::Encryption("failed to create AEAD key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

fn nonce_from_slice(bytes: &[u8]) -> Result<aead::Nonce, QShieldError> {
    aead::Nonce::try_assume_unique_for_key(bytes).map_err(|_| QShieldError::Decryption)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
