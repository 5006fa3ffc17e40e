//! Token manager for creating and validating lauth tokens.
//!
//! All tokens are RS256 JWS signed with one RSA key, and the `kid` header is
//! always set. Parsing verifies the signature first, then the `typ`
//! discriminator, then the per-kind claim checks in [`crate::claims`].

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};

use lauth_core::{StringSet, TtlConfig};
use lauth_crypto::{left_half_hash, JweKey, RsaKey};

use crate::claims::{
    AccessTokenClaims, Claims, CodeClaims, IdTokenClaims, LoginTokenClaims, RefreshTokenClaims,
    RequestObjectClaims, SsoTokenClaims, StandardClaims, TokenKind,
};
use crate::error::{TokenError, TokenResult};
use crate::jwks::{JsonWebKey, JsonWebKeySet};

/// Current Unix time in seconds.
#[must_use]
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Inputs of an ID token.
#[derive(Debug, Clone, Default)]
pub struct IdTokenRequest<'a> {
    /// Authenticated user.
    pub subject: &'a str,
    /// Audience.
    pub client_id: &'a str,
    /// Nonce to echo.
    pub nonce: Option<&'a str>,
    /// When the user authenticated.
    pub auth_time: i64,
    /// Code returned alongside, for `c_hash`.
    pub code: Option<&'a str>,
    /// Access token returned alongside, for `at_hash`.
    pub access_token: Option<&'a str>,
    /// Userinfo claims to merge.
    pub userinfo: Map<String, Value>,
}

/// Token manager.
pub struct TokenManager {
    issuer: String,
    ttl: TtlConfig,
    key: RsaKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwe: JweKey,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("issuer", &self.issuer)
            .field("kid", &self.key.key_id())
            .field("encoding_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a token manager signing with `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be converted for signing.
    pub fn new(issuer: impl Into<String>, ttl: TtlConfig, key: RsaKey) -> TokenResult<Self> {
        let private_der = key
            .private_pkcs1_der()
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_der(&private_der);
        let decoding_key = DecodingKey::from_rsa_der(key.public_pkcs1_der());
        let jwe = JweKey::from_rsa_key(&key).map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(Self {
            issuer: issuer.into(),
            ttl,
            key,
            encoding_key,
            decoding_key,
            jwe,
        })
    }

    /// Issuer placed in `iss`.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Token lifetimes.
    #[must_use]
    pub const fn ttl(&self) -> &TtlConfig {
        &self.ttl
    }

    /// Key id in every token header.
    #[must_use]
    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    /// Public key set with a fresh self-signed certificate for `hostname`.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be issued.
    pub fn jwks(&self, hostname: &str) -> TokenResult<JsonWebKeySet> {
        let certificate = self
            .key
            .self_signed_certificate(hostname)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok(JsonWebKeySet {
            keys: vec![JsonWebKey::rs256(&self.key, &certificate)],
        })
    }

    fn standard(&self, subject: &str, audience: &str, now: i64, ttl: i64) -> StandardClaims {
        StandardClaims::new(&self.issuer, subject, audience, now, ttl)
    }

    fn sign(&self, claims: &Claims) -> TokenResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.key_id().to_string());
        encode(&header, claims, &self.encoding_key).map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(token: &str, key: &DecodingKey) -> TokenResult<Value> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        decode::<Value>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))
    }

    /// Verifies the signature and decodes any token kind, without validating
    /// its claims.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidToken`] on signature or structural failure.
    pub fn parse(&self, token: &str) -> TokenResult<Claims> {
        let value = Self::verify(token, &self.decoding_key)?;
        serde_json::from_value(value).map_err(|e| TokenError::InvalidToken(e.to_string()))
    }

    fn parse_kind(&self, token: &str, expected: TokenKind) -> TokenResult<Claims> {
        let value = Self::verify(token, &self.decoding_key)?;
        let actual = value.get("typ").and_then(Value::as_str).unwrap_or_default();
        if actual != expected.as_str() {
            return Err(TokenError::UnexpectedTokenType {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| TokenError::InvalidToken(e.to_string()))
    }

    /// Creates an authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_code(
        &self,
        subject: &str,
        client_id: &str,
        redirect_uri: &str,
        scope: &StringSet,
        nonce: Option<&str>,
        auth_time: i64,
    ) -> TokenResult<String> {
        let claims = CodeClaims {
            standard: self.standard(subject, &self.issuer, now(), self.ttl.code.as_secs_i64()),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            scope: scope.clone(),
            nonce: nonce.map(str::to_string),
            auth_time,
        };
        self.sign(&Claims::Code(claims))
    }

    /// Parses and validates an authorization code.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_code(&self, token: &str) -> TokenResult<CodeClaims> {
        match self.parse_kind(token, TokenKind::Code)? {
            Claims::Code(claims) => {
                claims.validate(&self.issuer, now())?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::Code, &other)),
        }
    }

    /// Creates an access token authorized for `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_access_token(
        &self,
        subject: &str,
        client_id: &str,
        scope: &StringSet,
        auth_time: i64,
    ) -> TokenResult<String> {
        let claims = AccessTokenClaims {
            standard: self.standard(subject, &self.issuer, now(), self.ttl.token.as_secs_i64()),
            azp: vec![client_id.to_string()],
            scope: scope.clone(),
            auth_time,
        };
        self.sign(&Claims::AccessToken(claims))
    }

    /// Parses and validates an access token.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_access_token(&self, token: &str) -> TokenResult<AccessTokenClaims> {
        match self.parse_kind(token, TokenKind::AccessToken)? {
            Claims::AccessToken(claims) => {
                claims.validate(&self.issuer, now())?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::AccessToken, &other)),
        }
    }

    /// Creates an ID token, hashing the code and access token returned with
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_id_token(&self, request: IdTokenRequest<'_>) -> TokenResult<String> {
        let claims = IdTokenClaims {
            standard: self.standard(
                request.subject,
                request.client_id,
                now(),
                self.ttl.token.as_secs_i64(),
            ),
            nonce: request.nonce.map(str::to_string),
            auth_time: request.auth_time,
            c_hash: request.code.map(left_half_hash),
            at_hash: request.access_token.map(left_half_hash),
            userinfo: Map::new(),
        }
        .with_userinfo(request.userinfo);
        self.sign(&Claims::IdToken(claims))
    }

    /// Parses and validates an ID token issued to `client_id`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_id_token(&self, token: &str, client_id: &str) -> TokenResult<IdTokenClaims> {
        match self.parse_kind(token, TokenKind::IdToken)? {
            Claims::IdToken(claims) => {
                claims.validate(&self.issuer, client_id, now())?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::IdToken, &other)),
        }
    }

    /// Parses an ID token sent back as a logout hint.
    ///
    /// The audience must be a non-empty client id. Expiry is not enforced,
    /// since relying parties commonly hold on to ID tokens past `exp`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_id_token_hint(&self, token: &str) -> TokenResult<IdTokenClaims> {
        match self.parse_kind(token, TokenKind::IdToken)? {
            Claims::IdToken(claims) => {
                let client_id = claims.client_id().unwrap_or_default().to_string();
                claims.validate(&self.issuer, &client_id, claims.standard.iat)?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::IdToken, &other)),
        }
    }

    /// Expiry for an SSO session starting now.
    #[must_use]
    pub fn sso_expiry(&self) -> i64 {
        now().saturating_add(self.ttl.sso.as_secs_i64())
    }

    /// Creates an SSO token expiring at `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_sso_token(
        &self,
        subject: &str,
        azp: Vec<String>,
        auth_time: i64,
        expires_at: i64,
    ) -> TokenResult<String> {
        let issued_at = now();
        let claims = SsoTokenClaims {
            standard: self.standard(subject, &self.issuer, issued_at, expires_at - issued_at),
            azp,
            auth_time,
        };
        self.sign(&Claims::SsoToken(claims))
    }

    /// Parses and validates an SSO token.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_sso_token(&self, token: &str) -> TokenResult<SsoTokenClaims> {
        match self.parse_kind(token, TokenKind::SsoToken)? {
            Claims::SsoToken(claims) => {
                claims.validate(&self.issuer, now())?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::SsoToken, &other)),
        }
    }

    /// Creates a login form token bound to `client_ip` and `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_login_token(&self, client_ip: &str, client_id: &str) -> TokenResult<String> {
        let claims = LoginTokenClaims {
            standard: self.standard(client_ip, &self.issuer, now(), self.ttl.login.as_secs_i64()),
            client_id: client_id.to_string(),
        };
        self.sign(&Claims::LoginToken(claims))
    }

    /// Parses and validates a login form token.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_login_token(&self, token: &str) -> TokenResult<LoginTokenClaims> {
        match self.parse_kind(token, TokenKind::LoginToken)? {
            Claims::LoginToken(claims) => {
                claims.validate(&self.issuer, now())?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::LoginToken, &other)),
        }
    }

    /// Creates a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn create_refresh_token(
        &self,
        subject: &str,
        client_id: &str,
        scope: &StringSet,
        nonce: Option<&str>,
        auth_time: i64,
    ) -> TokenResult<String> {
        let claims = RefreshTokenClaims {
            standard: self.standard(subject, &self.issuer, now(), self.ttl.refresh.as_secs_i64()),
            client_id: client_id.to_string(),
            scope: scope.clone(),
            nonce: nonce.map(str::to_string),
            auth_time,
        };
        self.sign(&Claims::RefreshToken(claims))
    }

    /// Parses and validates a refresh token.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn parse_refresh_token(&self, token: &str) -> TokenResult<RefreshTokenClaims> {
        match self.parse_kind(token, TokenKind::RefreshToken)? {
            Claims::RefreshToken(claims) => {
                claims.validate(&self.issuer, now())?;
                Ok(claims)
            }
            other => Err(unexpected(TokenKind::RefreshToken, &other)),
        }
    }

    /// Parses a request object signed by `client_id` with the PEM public key
    /// it registered.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidToken`] if the key or signature is bad,
    /// otherwise the first failed claim check.
    pub fn parse_request_object(
        &self,
        token: &str,
        client_id: &str,
        public_key_pem: &str,
    ) -> TokenResult<RequestObjectClaims> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| TokenError::InvalidToken(format!("request key: {e}")))?;
        let value = Self::verify(token, &key)?;
        let claims: RequestObjectClaims =
            serde_json::from_value(value).map_err(|e| TokenError::InvalidToken(e.to_string()))?;
        claims.validate(&self.issuer, client_id, now())?;
        Ok(claims)
    }

    /// Wraps a signed token in a compact JWE only this server can open.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encrypt(&self, token: &str) -> TokenResult<String> {
        self.jwe
            .encrypt(token.as_bytes())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Opens a JWE produced by [`Self::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidToken`] if decryption fails.
    pub fn decrypt(&self, jwe: &str) -> TokenResult<String> {
        let bytes = self
            .jwe
            .decrypt(jwe)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TokenError::InvalidToken(e.to_string()))
    }
}

fn unexpected(expected: TokenKind, actual: &Claims) -> TokenError {
    TokenError::UnexpectedTokenType {
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
}
