//! Client secrets.
//!
//! Secrets are random strings over base62 plus `-_.`. The stored form is a
//! bcrypt hash of the SHA-512 digest of the secret, which keeps the bcrypt
//! input under its 72 byte limit regardless of secret length.

use rand::Rng;

use crate::error::{CryptoError, CryptoResult};
use crate::hash::sha512;

/// Length of secrets produced by [`generate_secret`].
pub const SECRET_LENGTH: usize = 100;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.";

/// Generates a random client secret of `len` characters.
#[must_use]
pub fn generate_secret(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

/// Hashes a plain secret for storage in configuration.
///
/// # Errors
///
/// Returns an error if bcrypt fails.
pub fn hash_secret(secret: &str) -> CryptoResult<String> {
    bcrypt::hash(sha512(secret.as_bytes()), bcrypt::DEFAULT_COST)
        .map_err(|e| CryptoError::Hashing(e.to_string()))
}

/// Checks a plain secret against a stored hash. Malformed hashes never match.
#[must_use]
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    match bcrypt::verify(sha512(secret.as_bytes()), hash) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "stored client secret hash is not valid bcrypt");
            false
        }
    }
}
