//! Compact JWE with `alg=A256GCMKW`, `enc=A256GCM` and DEFLATE compression.
//!
//! The key-encryption key is the SHA-256 digest of the signing key's PKCS#1
//! DER, so only this server can read what it encrypts.

use std::io::{Read, Write};

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};
use crate::hash::sha256;
use crate::keys::RsaKey;

const TAG_LEN: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    cty: String,
    zip: String,
    iv: String,
    tag: String,
}

/// Symmetric key for encrypting and decrypting compact JWEs.
pub struct JweKey {
    kek: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for JweKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JweKey").field("kek", &"[REDACTED]").finish()
    }
}

impl JweKey {
    /// Derives the key-encryption key from an RSA signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key cannot be encoded.
    pub fn from_rsa_key(key: &RsaKey) -> CryptoResult<Self> {
        Self::from_secret(&sha256(&key.private_pkcs1_der()?))
    }

    fn from_secret(secret: &[u8]) -> CryptoResult<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, secret)
            .map_err(|_| CryptoError::InvalidKey("AES-256 key must be 32 bytes".to_string()))?;
        Ok(Self {
            kek: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    fn random<const N: usize>(&self) -> CryptoResult<[u8; N]> {
        let mut buf = [0u8; N];
        self.rng
            .fill(&mut buf)
            .map_err(|_| CryptoError::Encryption("random source failed".to_string()))?;
        Ok(buf)
    }

    /// Encrypts `payload` (typically a signed JWT) into a compact JWE.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or encryption fails.
    pub fn encrypt(&self, payload: &[u8]) -> CryptoResult<String> {
        let cek_bytes: [u8; 32] = self.random()?;
        let wrap_iv: [u8; NONCE_LEN] = self.random()?;
        let mut encrypted_key = cek_bytes.to_vec();
        let wrap_tag = self
            .kek
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(wrap_iv),
                Aad::empty(),
                &mut encrypted_key,
            )
            .map_err(|_| CryptoError::Encryption("key wrap failed".to_string()))?;

        let header = JweHeader {
            alg: "A256GCMKW".to_string(),
            enc: "A256GCM".to_string(),
            cty: "JWT".to_string(),
            zip: "DEF".to_string(),
            iv: URL_SAFE_NO_PAD.encode(wrap_iv),
            tag: URL_SAFE_NO_PAD.encode(wrap_tag.as_ref()),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let protected = URL_SAFE_NO_PAD.encode(header_json);

        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload)?;
        let mut ciphertext = encoder.finish()?;

        let cek = UnboundKey::new(&AES_256_GCM, &cek_bytes)
            .map(LessSafeKey::new)
            .map_err(|_| CryptoError::Encryption("content key rejected".to_string()))?;
        let iv: [u8; NONCE_LEN] = self.random()?;
        let tag = cek
            .seal_in_place_separate_tag(
                Nonce::assume_unique_for_key(iv),
                Aad::from(protected.as_bytes()),
                &mut ciphertext,
            )
            .map_err(|_| CryptoError::Encryption("content encryption failed".to_string()))?;

        Ok(format!(
            "{protected}.{}.{}.{}.{}",
            URL_SAFE_NO_PAD.encode(encrypted_key),
            URL_SAFE_NO_PAD.encode(iv),
            URL_SAFE_NO_PAD.encode(ciphertext),
            URL_SAFE_NO_PAD.encode(tag.as_ref()),
        ))
    }

    /// Decrypts a compact JWE produced by [`JweKey::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] for malformed input, a foreign key
    /// or tampered ciphertext.
    pub fn decrypt(&self, token: &str) -> CryptoResult<Vec<u8>> {
        let parts: Vec<&str> = token.split('.').collect();
        let [protected, encrypted_key, iv, ciphertext, tag] = parts.as_slice() else {
            return Err(CryptoError::Decryption("expected five segments".to_string()));
        };

        let header: JweHeader = serde_json::from_slice(&decode(protected)?)
            .map_err(|e| CryptoError::Decryption(format!("header: {e}")))?;
        if header.alg != "A256GCMKW" || header.enc != "A256GCM" {
            return Err(CryptoError::Decryption(format!(
                "unsupported algorithm {}/{}",
                header.alg, header.enc
            )));
        }

        let mut wrapped = decode(encrypted_key)?;
        wrapped.extend_from_slice(&decode(&header.tag)?);
        let cek_bytes = self
            .kek
            .open_in_place(nonce(&decode(&header.iv)?)?, Aad::empty(), &mut wrapped)
            .map_err(|_| CryptoError::Decryption("key unwrap failed".to_string()))?
            .to_vec();

        let cek = UnboundKey::new(&AES_256_GCM, &cek_bytes)
            .map(LessSafeKey::new)
            .map_err(|_| CryptoError::Decryption("content key rejected".to_string()))?;
        let mut in_out = decode(ciphertext)?;
        let tag = decode(tag)?;
        if tag.len() != TAG_LEN {
            return Err(CryptoError::Decryption("bad tag length".to_string()));
        }
        in_out.extend_from_slice(&tag);
        let compressed = cek
            .open_in_place(nonce(&decode(iv)?)?, Aad::from(protected.as_bytes()), &mut in_out)
            .map_err(|_| CryptoError::Decryption("content decryption failed".to_string()))?;

        if header.zip != "DEF" {
            return Ok(compressed.to_vec());
        }
        let mut plain = Vec::new();
        DeflateDecoder::new(&compressed[..])
            .read_to_end(&mut plain)
            .map_err(|e| CryptoError::Decryption(format!("inflate: {e}")))?;
        Ok(plain)
    }
}

fn decode(segment: &str) -> CryptoResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| CryptoError::Decryption(format!("base64: {e}")))
}

fn nonce(iv: &[u8]) -> CryptoResult<Nonce> {
    Nonce::try_assume_unique_for_key(iv)
        .map_err(|_| CryptoError::Decryption("bad IV length".to_string()))
}
