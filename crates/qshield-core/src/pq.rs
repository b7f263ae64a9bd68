//! Post-quantum backend availability.
//!
//! The ML-KEM-768 and ML-DSA-65 implementations are compiled in behind
//! the `pq` cargo feature (enabled by default). Without it the library
//! operates classical-only: X25519 for key encapsulation and dual
//! Ed25519 for signatures. Callers that require post-quantum protection
//! must treat [`pq_available`] returning `false` as fatal — the library
//! itself only warns and continues.

/// Returns `true` if the post-quantum algorithms are compiled in.
#[must_use]
pub const fn pq_available() -> bool {
    cfg!(feature = "pq")
}

/// Print a one-shot warning that an operation ran without post-quantum
/// protection. Emitted at most once per process.
#[cfg(not(feature = "pq"))]
pub(crate) fn warn_pq_unavailable(operation: &str) {
    static WARNED: std::sync::Once = std::sync::Once::new();
    WARNED.call_once(|| {
        eprintln!(
            "[qshield-core] WARNING: post-quantum support is not compiled in \
             (the `pq` feature is disabled). {operation} is using classical \
             algorithms only, which are NOT post-quantum secure."
        );
    });
}
