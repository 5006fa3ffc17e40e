//! Protocol vocabularies.
//!
//! Implements values from OAuth 2.0 and `OpenID` Connect Core 1.0 that this
//! provider understands.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// OAuth 2.0 grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization code grant (RFC 6749 Section 4.1).
    AuthorizationCode,

    /// Implicit grant (RFC 6749 Section 4.2).
    Implicit,

    /// Refresh token grant (RFC 6749 Section 6).
    RefreshToken,
}

impl GrantType {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "implicit" => Ok(Self::Implicit),
            "refresh_token" => Ok(Self::RefreshToken),
            _ => Err(format!("unknown grant type: {s}")),
        }
    }
}

/// Response type elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization code.
    Code,
    /// Access token.
    Token,
    /// ID token.
    IdToken,
}

impl ResponseType {
    /// Every element, in canonical order.
    pub const ALL: [Self; 3] = [Self::Code, Self::IdToken, Self::Token];

    /// Wire names accepted in `response_type`.
    pub const SUPPORTED: &'static [&'static str] = &["code", "token", "id_token"];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
        }
    }

    /// Every non-empty combination, each in canonical (sorted) form.
    #[must_use]
    pub fn all_combinations() -> Vec<String> {
        let mut out = Vec::with_capacity(7);
        for mask in 1u8..8 {
            let parts: Vec<&str> = Self::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, t)| t.as_str())
                .collect();
            out.push(parts.join(" "));
        }
        out.sort_by_key(|s| (s.split(' ').count(), s.clone()));
        out
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Query string parameters (code flow).
    #[default]
    Query,

    /// Fragment parameters (implicit and hybrid flows).
    Fragment,
}

impl ResponseMode {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Fragment => "fragment",
        }
    }
}

/// `prompt` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prompt {
    /// Fail instead of showing any UI.
    None,
    /// Force re-authentication.
    Login,
    /// Ask for consent.
    Consent,
    /// Let the user pick an account.
    SelectAccount,
}

impl Prompt {
    /// Wire names accepted in `prompt`.
    pub const SUPPORTED: &'static [&'static str] = &["none", "login", "consent", "select_account"];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Login => "login",
            Self::Consent => "consent",
            Self::SelectAccount => "select_account",
        }
    }

    /// Whether this prompt forbids reusing an SSO session.
    #[must_use]
    pub const fn requires_interaction(self) -> bool {
        matches!(self, Self::Login | Self::Consent | Self::SelectAccount)
    }
}
