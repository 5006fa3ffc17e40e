//! RSA signing keys.
//!
//! The key id published in JWKS and token headers is a UUIDv5 in the X.500
//! namespace over the PKCS#1 DER encoding of the public key, so it stays the
//! same across restarts for a given key file.

use std::fmt;
use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CryptoError, CryptoResult};

/// Size of keys created by [`RsaKey::generate`].
pub const GENERATED_KEY_BITS: usize = 2048;

/// Computes the key id for a PKCS#1 DER encoded public key.
#[must_use]
pub fn key_id(public_pkcs1_der: &[u8]) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_X500, public_pkcs1_der).to_string()
}

/// An RSA private key with its derived key id.
#[derive(Clone)]
pub struct RsaKey {
    private: RsaPrivateKey,
    public_der: Vec<u8>,
    key_id: String,
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("key_id", &self.key_id)
            .field("bits", &(self.private.size() * 8))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

impl RsaKey {
    fn from_private(private: RsaPrivateKey) -> CryptoResult<Self> {
        let public_der = private
            .to_public_key()
            .to_pkcs1_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        let key_id = key_id(&public_der);
        Ok(Self {
            private,
            public_der,
            key_id,
        })
    }

    /// Generates a fresh key that lives for the process lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the operating system RNG fails.
    pub fn generate() -> CryptoResult<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, GENERATED_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Self::from_private(private)
    }

    /// Parses a PEM private key in PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8
    /// (`PRIVATE KEY`) form.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM is neither.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let private = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Self::from_private(private)
    }

    /// Reads and parses a PEM key file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> CryptoResult<Self> {
        let pem = std::fs::read_to_string(path)?;
        let key = Self::from_pem(&pem)?;
        tracing::info!(path = %path.display(), kid = %key.key_id, "loaded signing key");
        Ok(key)
    }

    /// Key id derived from the public key.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// PKCS#1 DER of the public key.
    #[must_use]
    pub fn public_pkcs1_der(&self) -> &[u8] {
        &self.public_der
    }

    /// PKCS#1 DER of the private key.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn private_pkcs1_der(&self) -> CryptoResult<Vec<u8>> {
        self.private
            .to_pkcs1_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// PKCS#8 PEM of the private key.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn private_pkcs8_pem(&self) -> CryptoResult<String> {
        self.private
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// SPKI PEM (`PUBLIC KEY`) of the public key.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn public_pem(&self) -> CryptoResult<String> {
        self.private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Big-endian modulus.
    #[must_use]
    pub fn modulus(&self) -> Vec<u8> {
        self.private.n().to_bytes_be()
    }

    /// Big-endian public exponent.
    #[must_use]
    pub fn exponent(&self) -> Vec<u8> {
        self.private.e().to_bytes_be()
    }

    /// Issues a self-signed certificate for this key, valid for one hour,
    /// with `CN=<hostname>`. Returns DER.
    ///
    /// # Errors
    ///
    /// Returns an error if certificate signing fails.
    pub fn self_signed_certificate(&self, hostname: &str) -> CryptoResult<Vec<u8>> {
        let pem = self.private_pkcs8_pem()?;
        let key_pair = rcgen::KeyPair::from_pem_and_sign_algo(&pem, &rcgen::PKCS_RSA_SHA256)
            .map_err(|e| CryptoError::Certificate(e.to_string()))?;

        let mut params = rcgen::CertificateParams::new(Vec::<String>::new())
            .map_err(|e| CryptoError::Certificate(e.to_string()))?;
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(rcgen::DnType::CommonName, hostname);
        params.distinguished_name = dn;
        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::hours(1);

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| CryptoError::Certificate(e.to_string()))?;
        Ok(cert.der().to_vec())
    }
}
