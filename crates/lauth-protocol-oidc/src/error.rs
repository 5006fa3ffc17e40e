//! OIDC protocol error types.
//!
//! Implements OAuth 2.0 and `OpenID` Connect error responses as defined in:
//! - RFC 6749 (OAuth 2.0)
//! - RFC 6750 (Bearer Token Usage)
//! - `OpenID` Connect Core 1.0
//!
//! [`OidcError`] is a single record carrying everything needed to render an
//! error later: the reason, an optional description and cause, and, for
//! authorization requests, where and how to redirect. Rendering happens in
//! [`crate::endpoints::dispatch`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use lauth_core::StringSet;

/// Closed set of error codes this provider emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    /// `access_denied`
    AccessDenied,
    /// `invalid_client`
    InvalidClient,
    /// `invalid_grant`
    InvalidGrant,
    /// `invalid_request`
    InvalidRequest,
    /// `invalid_request_object`
    InvalidRequestObject,
    /// `invalid_scope`
    InvalidScope,
    /// `invalid_token`
    InvalidToken,
    /// `request_not_supported`
    RequestNotSupported,
    /// `request_uri_not_supported`
    RequestUriNotSupported,
    /// `server_error`
    ServerError,
    /// `temporarily_unavailable`
    TemporarilyUnavailable,
    /// `unauthorized_client`
    UnauthorizedClient,
    /// `unsupported_grant_type`
    UnsupportedGrantType,
    /// `unsupported_response_type`
    UnsupportedResponseType,
    /// `method_not_allowed`
    MethodNotAllowed,
    /// `page_not_found`
    PageNotFound,
    /// `login_required`
    LoginRequired,
}

impl ErrorReason {
    /// Returns the wire error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::InvalidRequest => "invalid_request",
            Self::InvalidRequestObject => "invalid_request_object",
            Self::InvalidScope => "invalid_scope",
            Self::InvalidToken => "invalid_token",
            Self::RequestNotSupported => "request_not_supported",
            Self::RequestUriNotSupported => "request_uri_not_supported",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::PageNotFound => "page_not_found",
            Self::LoginRequired => "login_required",
        }
    }

    /// Returns the HTTP status used when this reason is rendered directly.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::ServerError => 500,
            Self::InvalidToken => 403,
            Self::MethodNotAllowed => 405,
            Self::PageNotFound => 404,
            _ => 400,
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boxed error kept as the cause of an [`OidcError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A protocol error with its rendering context.
#[derive(Debug, Error)]
#[error("{reason}{}", .description.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
pub struct OidcError {
    /// Error code.
    pub reason: ErrorReason,
    /// Human-readable description.
    pub description: Option<String>,
    /// Underlying failure, logged but never shown to the user agent.
    #[source]
    pub cause: Option<BoxError>,
    /// Where to send the user agent, if the redirect target is trusted.
    pub redirect_uri: Option<Url>,
    /// Response type of the request, which selects query or fragment.
    pub response_type: StringSet,
    /// `state` to echo back.
    pub state: Option<String>,
    /// Status override.
    pub status: Option<u16>,
}

impl OidcError {
    /// Creates an error with no description.
    #[must_use]
    pub fn new(reason: ErrorReason) -> Self {
        Self {
            reason,
            description: None,
            cause: None,
            redirect_uri: None,
            response_type: StringSet::new(),
            state: None,
            status: None,
        }
    }

    /// Creates an error with a description.
    #[must_use]
    pub fn with_description(reason: ErrorReason, description: impl Into<String>) -> Self {
        Self::new(reason).describe(description)
    }

    /// `invalid_request` with a description.
    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::with_description(ErrorReason::InvalidRequest, description)
    }

    /// `server_error` with a description.
    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::with_description(ErrorReason::ServerError, description)
    }

    /// `invalid_token` with a description.
    #[must_use]
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::with_description(ErrorReason::InvalidToken, description)
    }

    /// Sets the description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attaches the underlying failure.
    #[must_use]
    pub fn caused_by(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Marks the error as redirectable to `redirect_uri`.
    #[must_use]
    pub fn redirect_to(
        mut self,
        redirect_uri: &Url,
        response_type: &StringSet,
        state: Option<&str>,
    ) -> Self {
        self.redirect_uri = Some(redirect_uri.clone());
        self.response_type = response_type.clone();
        self.state = state.map(str::to_string);
        self
    }

    /// Overrides the HTTP status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// HTTP status for direct rendering.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.status.unwrap_or_else(|| self.reason.http_status())
    }

    /// Whether parameters travel in the fragment rather than the query.
    #[must_use]
    pub fn uses_fragment(&self) -> bool {
        !(self.response_type.is_empty() || self.response_type.is_exactly(&["code"]))
    }

    /// Builds the redirect target with error parameters, if redirectable.
    #[must_use]
    pub fn redirect_location(&self) -> Option<Url> {
        let mut params: Vec<(&str, &str)> = Vec::with_capacity(3);
        if let Some(state) = &self.state {
            params.push(("state", state));
        }
        params.push(("error", self.reason.as_str()));
        if let Some(description) = &self.description {
            params.push(("error_description", description));
        }
        self.redirect_uri
            .as_ref()
            .map(|uri| place_parameters(uri, &params, self.uses_fragment()))
    }

    /// JSON body for token and userinfo style responses.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            state: self.state.clone(),
            error: self.reason.as_str().to_string(),
            error_description: self.description.clone(),
        }
    }
}

impl From<ErrorReason> for OidcError {
    fn from(reason: ErrorReason) -> Self {
        Self::new(reason)
    }
}

/// Appends `params` to the query, or replaces the fragment with them.
#[must_use]
pub fn place_parameters<K: AsRef<str>, V: AsRef<str>>(
    uri: &Url,
    params: &[(K, V)],
    fragment: bool,
) -> Url {
    let mut out = uri.clone();
    if fragment {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())))
            .finish();
        out.set_fragment(Some(&encoded));
    } else {
        out.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_ref(), v.as_ref())));
    }
    out
}

/// OAuth 2.0 error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// `state` of the failed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Result type for OIDC operations.
pub type OidcResult<T> = Result<T, OidcError>;

/// Token validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature, encoding or structure is wrong.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// `iss` is not the expected issuer.
    #[error("unexpected issuer")]
    UnexpectedIssuer,

    /// `aud` does not contain the expected audience.
    #[error("unexpected audience")]
    UnexpectedAudience,

    /// `typ` names a different token kind.
    #[error("unexpected token type: expected {expected}, got {actual}")]
    UnexpectedTokenType {
        /// The kind the caller asked for.
        expected: String,
        /// The kind found in the token.
        actual: String,
    },

    /// A required `client_id` is missing or empty.
    #[error("unexpected client_id")]
    UnexpectedClientId,

    /// `exp` is not in the future.
    #[error("token is expired")]
    Expired,

    /// Signing failed.
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
