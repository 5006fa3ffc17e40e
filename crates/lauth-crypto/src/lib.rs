//! # lauth-crypto
//!
//! Cryptographic building blocks for lauth.
//!
//! ## Modules
//!
//! - [`hash`] - SHA digests and the left-half hashes used by `c_hash`/`at_hash`
//! - [`jwe`] - AES-256-GCM compact JWE with key wrapping
//! - [`keys`] - RSA signing key loading, generation and identification
//! - [`secret`] - Client secret generation and bcrypt hashing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod hash;
pub mod jwe;
pub mod keys;
pub mod secret;

pub use error::{CryptoError, CryptoResult};
pub use hash::{left_half_hash, sha256, sha512};
pub use jwe::JweKey;
pub use keys::{key_id, RsaKey};
pub use secret::{generate_secret, hash_secret, verify_secret, SECRET_LENGTH};
