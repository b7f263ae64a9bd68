//! Secure memory types for secret key material.
//!
//! Every secret-bearing object in this crate (cipher keys, KEM/signing
//! secret keys, derived keys, intermediate shared secrets) stores its
//! bytes in one of the two wrappers defined here:
//!
//! - [`SecretBuffer`] for variable-length material
//! - [`SecretBytes`] for fixed-length keys
//!
//! Both overwrite their contents with zeros before the storage is
//! released, pin their pages in RAM via `mlock` where the platform
//! allows it, and mask their `Debug` output. Page locking is best
//! effort: a failed `mlock` leaves the buffer usable but swappable, and
//! flips the process-wide [`locking_degraded`] flag so callers with a
//! no-swap requirement can detect the condition.
//!
//! Secret-to-secret comparison goes through [`SecretBuffer::ct_eq`],
//! which is constant-time.

use crate::error::QShieldError;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretSlice};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

// ---------------------------------------------------------------------------
// Page locking
// ---------------------------------------------------------------------------

/// Set when any allocation in this process fails to `mlock`.
static LOCK_FAILED: AtomicBool = AtomicBool::new(false);

/// Returns `true` if any secret allocation in this process could not be
/// locked in RAM and may therefore reach swap.
///
/// The flag is sticky: once locking has degraded it stays set for the
/// lifetime of the process. Callers with a hard no-swap requirement
/// should check it after allocating their long-lived keys.
#[must_use]
pub fn locking_degraded() -> bool {
    LOCK_FAILED.load(Ordering::Relaxed)
}

/// Try to pin `len` bytes at `ptr` in RAM. Returns whether the region
/// is locked. The first failure in the process prints a warning to
/// stderr and sets the [`locking_degraded`] flag.
fn lock_pages(ptr: *const u8, len: usize) -> bool {
    if len == 0 {
        return true;
    }
    if sys::mlock(ptr, len) {
        return true;
    }
    if !LOCK_FAILED.swap(true, Ordering::Relaxed) {
        eprintln!(
            "[qshield-core] WARNING: mlock failed; secret key material may \
             be swapped to disk. Raise RLIMIT_MEMLOCK to restore locking."
        );
    }
    false
}

/// Release a lock taken by [`lock_pages`].
fn unlock_pages(ptr: *const u8, len: usize) {
    if len > 0 {
        sys::munlock(ptr, len);
    }
}

// ---------------------------------------------------------------------------
// SecretBuffer — variable-length
// ---------------------------------------------------------------------------

/// Variable-length buffer for secret material.
///
/// The bytes live in a [`SecretSlice<u8>`] (zeroized on drop by the
/// `secrecy` crate); the buffer additionally `mlock`s its pages on
/// allocation and unlocks them on drop, and masks `Debug` output.
pub struct SecretBuffer {
    inner: SecretSlice<u8>,
    locked: bool,
}

impl SecretBuffer {
    /// Create a new `SecretBuffer` holding a copy of `data`.
    ///
    /// The caller should zeroize the source buffer after this returns.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::SecureMemory` if allocation fails.
    pub fn new(data: &[u8]) -> Result<Self, QShieldError> {
        let inner: SecretSlice<u8> = data.to_vec().into();
        let exposed = inner.expose_secret();
        let locked = lock_pages(exposed.as_ptr(), exposed.len());
        Ok(Self { inner, locked })
    }

    /// Create a `SecretBuffer` filled with cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::SecureMemory` if the CSPRNG fails.
    pub fn random(len: usize) -> Result<Self, QShieldError> {
        let mut bytes = vec![0u8; len];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| QShieldError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        let result = Self::new(&bytes);
        bytes.zeroize();
        result
    }

    /// Expose the underlying bytes for a cryptographic operation.
    ///
    /// Keep exposure minimal — prefer using the slice within a single
    /// expression over binding it to a long-lived variable.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.inner.expose_secret()
    }

    /// Returns the number of bytes in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.expose_secret().len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if this buffer's pages are pinned in RAM.
    #[must_use]
    pub const fn is_mlocked(&self) -> bool {
        self.locked
    }

    /// Constant-time equality against another secret.
    ///
    /// Buffers of different lengths compare unequal (the length itself is
    /// not hidden). Use this instead of `==` whenever both sides are
    /// secret, e.g. comparing two decapsulated shared secrets.
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        ring::constant_time::verify_slices_are_equal(self.expose(), other.expose()).is_ok()
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        if self.locked {
            let exposed = self.inner.expose_secret();
            unlock_pages(exposed.as_ptr(), exposed.len());
        }
        // `inner` drops after this and zeroizes the bytes; munlock must
        // come first, while the allocation is still live.
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretBuffer(***)")
    }
}

// ---------------------------------------------------------------------------
// SecretBytes<N> — fixed-size
// ---------------------------------------------------------------------------

/// Fixed-size buffer for keys and other fixed-length secrets.
///
/// Stored inline rather than on the heap; `Drop` unlocks the pages and
/// zeroizes the array, so rotated-out cipher keys are scrubbed the
/// moment the new ones are installed over them.
///
/// **Note on `mlock`:** the pages are locked at the value's address at
/// construction time. If the value is later moved, the lock stays on
/// the original pages; `munlock` on those pages at drop is a safe
/// no-op, and zeroization always acts on the value's current location.
pub struct SecretBytes<const N: usize> {
    bytes: [u8; N],
    locked: bool,
}

impl<const N: usize> SecretBytes<N> {
    /// Create a new `SecretBytes` from a fixed-size array.
    ///
    /// The input array is moved into the struct (no copy remains).
    #[must_use]
    pub fn new(data: [u8; N]) -> Self {
        let mut s = Self {
            bytes: data,
            locked: false,
        };
        s.locked = lock_pages(s.bytes.as_ptr(), N);
        s
    }

    /// Create `SecretBytes` filled with cryptographically random bytes.
    ///
    /// # Errors
    ///
    /// Returns `QShieldError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, QShieldError> {
        let mut bytes = [0u8; N];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| QShieldError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        let result = Self::new(bytes);
        bytes.zeroize();
        Ok(result)
    }

    /// Expose the underlying bytes for cryptographic operations.
    #[must_use]
    pub const fn expose(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> Drop for SecretBytes<N> {
    fn drop(&mut self) {
        if self.locked {
            unlock_pages(self.bytes.as_ptr(), N);
        }
        self.bytes.zeroize();
    }
}

impl<const N: usize> fmt::Debug for SecretBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes<{N}>(***)")
    }
}

impl<const N: usize> From<[u8; N]> for SecretBytes<N> {
    fn from(data: [u8; N]) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Core dump disabling
// ---------------------------------------------------------------------------

/// Disable core dumps for the current process.
///
/// On Unix: sets `RLIMIT_CORE` to 0 (soft and hard). Elsewhere: no-op.
/// Call this early in processes that hold long-lived key material.
///
/// # Errors
///
/// Returns `QShieldError::SecureMemory` if the `setrlimit` call fails.
pub fn disable_core_dumps() -> Result<(), QShieldError> {
    if sys::set_core_limit_zero() {
        Ok(())
    } else {
        Err(QShieldError::SecureMemory(
            "failed to disable core dumps via RLIMIT_CORE".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Platform layer
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod sys {
    pub(super) fn mlock(ptr: *const u8, len: usize) -> bool {
        // SAFETY: the region [ptr, ptr+len) is owned by the calling
        // buffer for its whole lifetime; mlock does not dereference it.
        unsafe { libc::mlock(ptr.cast(), len) == 0 }
    }

    pub(super) fn munlock(ptr: *const u8, len: usize) {
        // SAFETY: as for mlock. Failure here is non-critical.
        unsafe {
            libc::munlock(ptr.cast(), len);
        }
    }

    pub(super) fn set_core_limit_zero() -> bool {
        let limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with RLIMIT_CORE is a standard POSIX call.
        unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) == 0 }
    }
}

#[cfg(not(unix))]
mod sys {
    pub(super) fn mlock(_ptr: *const u8, _len: usize) -> bool {
        false
    }

    pub(super) fn munlock(_ptr: *const u8, _len: usize) {}

    pub(super) fn set_core_limit_zero() -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
