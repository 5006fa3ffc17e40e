//! JSON Web Key Set (JWKS) types.
//!
//! Implements JWKS as defined in:
//! - [RFC 7517](https://tools.ietf.org/html/rfc7517) (JSON Web Key)
//! - [RFC 7518](https://tools.ietf.org/html/rfc7518) (JSON Web Algorithms)

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use lauth_crypto::RsaKey;

/// JSON Web Key Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of JSON Web Keys.
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Finds a key by its ID.
    #[must_use]
    pub fn find_key(&self, kid: &str) -> Option<&JsonWebKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }
}

/// An RSA signature verification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key ID.
    pub kid: String,

    /// Public key use.
    #[serde(rename = "use")]
    pub key_use: String,

    /// Algorithm.
    pub alg: String,

    /// Key type.
    pub kty: String,

    /// base64url modulus.
    pub n: String,

    /// base64url public exponent.
    pub e: String,

    /// Standard base64 DER certificates.
    pub x5c: Vec<String>,
}

impl JsonWebKey {
    /// Describes `key` for RS256 signatures, with `certificate` (DER).
    #[must_use]
    pub fn rs256(key: &RsaKey, certificate: &[u8]) -> Self {
        Self {
            kid: key.key_id().to_string(),
            key_use: "sig".to_string(),
            alg: "RS256".to_string(),
            kty: "RSA".to_string(),
            n: URL_SAFE_NO_PAD.encode(key.modulus()),
            e: URL_SAFE_NO_PAD.encode(key.exponent()),
            x5c: vec![STANDARD.encode(certificate)],
        }
    }
}
