//! Cryptographic error types.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Errors from key handling, hashing and encryption.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be read or parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Self-signed certificate creation failed.
    #[error("certificate generation failed: {0}")]
    Certificate(String),

    /// Secret hashing failed.
    #[error("hashing failed: {0}")]
    Hashing(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed or the input was malformed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Reading a key file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
