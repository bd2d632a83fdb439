//! One-way hashing and verification of account secrets.
//!
//! Plaintext secrets only ever live on the stack here; the rest of the crate
//! sees the bcrypt digest.

use anyhow::anyhow;

use crate::api::error::AuthError;

/// Fixed bcrypt work factor for all stored digests.
const HASH_COST: u32 = 10;

/// Hash a plaintext secret for storage.
///
/// # Errors
///
/// Returns `Validation` for empty input and `Internal` if the hashing
/// primitive itself fails.
pub fn hash_secret(plaintext: &str) -> Result<String, AuthError> {
    if plaintext.trim().is_empty() {
        return Err(AuthError::validation("Password must not be empty"));
    }
    bcrypt::hash(plaintext, HASH_COST)
        .map_err(|err| AuthError::Internal(anyhow!("failed to hash secret: {err}")))
}

/// Check a plaintext secret against a stored digest.
///
/// A mismatch is `Ok(false)`, not an error.
///
/// # Errors
///
/// Returns `CorruptDigest` when the stored digest cannot be parsed.
pub fn verify_secret(plaintext: &str, digest: &str) -> Result<bool, AuthError> {
    bcrypt::verify(plaintext, digest).map_err(|_| AuthError::CorruptDigest)
}
