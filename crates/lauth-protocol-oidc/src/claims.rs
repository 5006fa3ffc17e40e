//! JWT claim types for lauth tokens.
//!
//! Every token this provider signs is one variant of [`Claims`]. The `typ`
//! claim names the variant on the wire, and all variants share
//! [`StandardClaims`] for `iss`, `sub`, `aud`, `iat` and `exp`.
//!
//! Implements claims as defined in:
//! - RFC 7519 (JSON Web Token)
//! - `OpenID` Connect Core 1.0

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use lauth_core::StringSet;

use crate::error::{TokenError, TokenResult};

/// Token kinds, named by their `typ` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Authorization code.
    Code,
    /// Bearer access token.
    AccessToken,
    /// `OpenID` Connect ID token.
    IdToken,
    /// Browser single sign-on session.
    SsoToken,
    /// Login form anti-replay token.
    LoginToken,
    /// Refresh token.
    RefreshToken,
}

impl TokenKind {
    /// The `typ` literal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "CODE",
            Self::AccessToken => "ACCESS_TOKEN",
            Self::IdToken => "ID_TOKEN",
            Self::SsoToken => "SSO_TOKEN",
            Self::LoginToken => "LOGIN_TOKEN",
            Self::RefreshToken => "REFRESH_TOKEN",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audience claim - single string or array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// Single audience.
    Single(String),
    /// Multiple audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Checks if the audience contains a specific value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(s) => s == value,
            Self::Multiple(v) => v.iter().any(|s| s == value),
        }
    }

    /// First audience entry.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s),
            Self::Multiple(v) => v.first().map(String::as_str),
        }
    }
}

impl From<String> for Audience {
    fn from(s: String) -> Self {
        Self::Single(s)
    }
}

impl From<&str> for Audience {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

/// Claims every token carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Issuer.
    pub iss: String,
    /// Subject. The username, or the client IP for login tokens.
    pub sub: String,
    /// Audience.
    pub aud: Audience,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

impl StandardClaims {
    /// Claims issued now and expiring `ttl` seconds later.
    #[must_use]
    pub fn new(issuer: &str, subject: &str, audience: impl Into<Audience>, now: i64, ttl: i64) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            aud: audience.into(),
            iat: now,
            exp: now.saturating_add(ttl),
        }
    }

    /// Shared check of issuer, audience and expiry.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, audience: &str, now: i64) -> TokenResult<()> {
        if self.iss != issuer {
            return Err(TokenError::UnexpectedIssuer);
        }
        if !self.aud.contains(audience) {
            return Err(TokenError::UnexpectedAudience);
        }
        if self.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

fn require_client_id(client_id: &str) -> TokenResult<()> {
    if client_id.is_empty() {
        Err(TokenError::UnexpectedClientId)
    } else {
        Ok(())
    }
}

/// Authorization code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeClaims {
    /// Shared claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Client the code was issued to.
    pub client_id: String,
    /// Redirect URI of the authorization request.
    pub redirect_uri: String,
    /// Requested scope.
    #[serde(default)]
    pub scope: StringSet,
    /// Nonce of the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// When the user authenticated.
    pub auth_time: i64,
}

impl CodeClaims {
    /// Validates against `issuer` at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, now: i64) -> TokenResult<()> {
        self.standard.validate(issuer, issuer, now)?;
        require_client_id(&self.client_id)
    }
}

/// Bearer access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Shared claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Authorized parties.
    #[serde(default)]
    pub azp: Vec<String>,
    /// Granted scope.
    #[serde(default)]
    pub scope: StringSet,
    /// When the user authenticated.
    pub auth_time: i64,
}

impl AccessTokenClaims {
    /// Validates against `issuer` at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, now: i64) -> TokenResult<()> {
        self.standard.validate(issuer, issuer, now)
    }
}

/// Claim names an ID token sets itself; userinfo claims never override them.
const ID_TOKEN_RESERVED: &[&str] = &[
    "iss", "sub", "aud", "iat", "exp", "typ", "nonce", "auth_time", "c_hash", "at_hash",
];

/// `OpenID` Connect ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Shared claims. The audience is the client id.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Nonce of the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// When the user authenticated.
    pub auth_time: i64,
    /// Half hash of the authorization code returned alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,
    /// Half hash of the access token returned alongside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,
    /// Userinfo claims merged into the payload.
    #[serde(flatten)]
    pub userinfo: Map<String, Value>,
}

impl IdTokenClaims {
    /// Merges userinfo claims, skipping names the token sets itself.
    #[must_use]
    pub fn with_userinfo(mut self, userinfo: Map<String, Value>) -> Self {
        for (name, value) in userinfo {
            if !ID_TOKEN_RESERVED.contains(&name.as_str()) {
                self.userinfo.insert(name, value);
            }
        }
        self
    }

    /// Validates for `client_id` at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, client_id: &str, now: i64) -> TokenResult<()> {
        require_client_id(client_id)?;
        self.standard.validate(issuer, client_id, now)
    }

    /// The client the token was issued to.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.standard.aud.first()
    }
}

/// Browser single sign-on session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsoTokenClaims {
    /// Shared claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Clients the user has signed in to during this session.
    #[serde(default)]
    pub azp: Vec<String>,
    /// When the user authenticated.
    pub auth_time: i64,
}

impl SsoTokenClaims {
    /// Validates against `issuer` at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, now: i64) -> TokenResult<()> {
        self.standard.validate(issuer, issuer, now)
    }
}

/// Login form anti-replay token. The subject is the client IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginTokenClaims {
    /// Shared claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Client the form was rendered for.
    pub client_id: String,
}

impl LoginTokenClaims {
    /// Validates against `issuer` at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, now: i64) -> TokenResult<()> {
        self.standard.validate(issuer, issuer, now)?;
        require_client_id(&self.client_id)
    }
}

/// Refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Shared claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Client the token was issued to.
    pub client_id: String,
    /// Granted scope.
    #[serde(default)]
    pub scope: StringSet,
    /// Nonce of the original authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// When the user authenticated.
    pub auth_time: i64,
}

impl RefreshTokenClaims {
    /// Validates against `issuer` at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, now: i64) -> TokenResult<()> {
        self.standard.validate(issuer, issuer, now)?;
        require_client_id(&self.client_id)
    }
}

/// Any token this provider signs, discriminated by `typ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typ")]
pub enum Claims {
    /// `CODE`
    #[serde(rename = "CODE")]
    Code(CodeClaims),
    /// `ACCESS_TOKEN`
    #[serde(rename = "ACCESS_TOKEN")]
    AccessToken(AccessTokenClaims),
    /// `ID_TOKEN`
    #[serde(rename = "ID_TOKEN")]
    IdToken(IdTokenClaims),
    /// `SSO_TOKEN`
    #[serde(rename = "SSO_TOKEN")]
    SsoToken(SsoTokenClaims),
    /// `LOGIN_TOKEN`
    #[serde(rename = "LOGIN_TOKEN")]
    LoginToken(LoginTokenClaims),
    /// `REFRESH_TOKEN`
    #[serde(rename = "REFRESH_TOKEN")]
    RefreshToken(RefreshTokenClaims),
}

impl Claims {
    /// Kind of this token.
    #[must_use]
    pub const fn kind(&self) -> TokenKind {
        match self {
            Self::Code(_) => TokenKind::Code,
            Self::AccessToken(_) => TokenKind::AccessToken,
            Self::IdToken(_) => TokenKind::IdToken,
            Self::SsoToken(_) => TokenKind::SsoToken,
            Self::LoginToken(_) => TokenKind::LoginToken,
            Self::RefreshToken(_) => TokenKind::RefreshToken,
        }
    }

    /// Shared claims.
    #[must_use]
    pub const fn standard(&self) -> &StandardClaims {
        match self {
            Self::Code(c) => &c.standard,
            Self::AccessToken(c) => &c.standard,
            Self::IdToken(c) => &c.standard,
            Self::SsoToken(c) => &c.standard,
            Self::LoginToken(c) => &c.standard,
            Self::RefreshToken(c) => &c.standard,
        }
    }
}

/// Claims of a signed authorization request object.
///
/// Every authorization parameter is optional; present values replace the
/// ones sent as query or form parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestObjectClaims {
    /// Must equal the client id.
    #[serde(default)]
    pub iss: String,
    /// Must contain the issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    /// Optional expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Accepted as a number or a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<Value>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
}

impl RequestObjectClaims {
    /// Validates a request object signed by `client_id` for `issuer`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn validate(&self, issuer: &str, client_id: &str, now: i64) -> TokenResult<()> {
        if self.iss != client_id {
            return Err(TokenError::UnexpectedIssuer);
        }
        if !self.aud.as_ref().is_some_and(|aud| aud.contains(issuer)) {
            return Err(TokenError::UnexpectedAudience);
        }
        if self.exp.is_some_and(|exp| exp <= now) {
            return Err(TokenError::Expired);
        }
        if self.client_id.as_deref().is_some_and(|id| id != client_id) {
            return Err(TokenError::UnexpectedClientId);
        }
        Ok(())
    }
}
