//! Token endpoint handler.
//!
//! Implements POST `/login/token` for the `authorization_code` grant. The
//! endpoint is for confidential clients only; browser preflights are
//! refused.

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, ORIGIN};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use url::Url;

use lauth_ldap::DirectoryError;

use crate::error::{ErrorReason, OidcError, OidcResult};
use crate::request::TokenParams;
use crate::token::IdTokenRequest;
use crate::types::GrantType;

use super::client_auth::extract_credentials;
use super::dispatch::{count, JsonError, NO_STORE};
use super::extract::{BindError, Bound};
use super::issue::granted_scope;
use super::state::{OidcState, Provider};

/// Successful token response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Always `Bearer`.
    pub token_type: String,
    /// Access token.
    pub access_token: String,
    /// ID token.
    pub id_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    /// Granted scope.
    pub scope: String,
}

/// POST `/login/token`
///
/// # Responses
///
/// - 200 OK: [`TokenResponse`]
/// - 400 Bad Request: invalid request, client or grant
/// - 500 Internal Server Error: directory or signing failure
pub(crate) async fn token(
    State(state): State<OidcState>,
    headers: HeaderMap,
    params: Result<Bound<TokenParams>, BindError>,
) -> Response {
    let result = match params {
        Ok(Bound(params)) => exchange(&state.provider, &headers, params).await,
        Err(e) => Err(e.0),
    };
    count("lauth_token_total", result.is_ok());
    match result {
        Ok(response) => (StatusCode::OK, NO_STORE, Json(response)).into_response(),
        Err(e) => JsonError(e).into_response(),
    }
}

/// OPTIONS `/login/token`
pub(crate) async fn token_preflight(headers: HeaderMap) -> Response {
    let from_browser = headers
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty());
    if from_browser {
        return JsonError(
            OidcError::with_description(
                ErrorReason::AccessDenied,
                "Origin header was set. You can't use token endpoint via browser.",
            )
            .with_status(403),
        )
        .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn exchange(
    provider: &Provider,
    headers: &HeaderMap,
    params: TokenParams,
) -> OidcResult<TokenResponse> {
    let grant_type = params.grant_type.as_deref().unwrap_or_default();
    if grant_type.parse::<GrantType>().ok() != Some(GrantType::AuthorizationCode) {
        return Err(OidcError::with_description(
            ErrorReason::UnsupportedGrantType,
            format!("grant_type {grant_type:?} is not supported"),
        ));
    }

    let code = params
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| OidcError::invalid_request("code is required"))?;
    let redirect_uri = params
        .redirect_uri
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| OidcError::invalid_request("redirect_uri is required"))?;
    if Url::parse(redirect_uri).is_err() {
        return Err(OidcError::invalid_request("redirect_uri is not absolute URL"));
    }

    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let credentials = extract_credentials(
        auth_header,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    )?;
    credentials.authenticate(&provider.config)?;

    let claims = provider.tokens.parse_code(code).map_err(|e| {
        OidcError::with_description(ErrorReason::InvalidGrant, "code is invalid or expired")
            .caused_by(e)
    })?;
    if credentials
        .client_id
        .as_deref()
        .is_some_and(|id| id != claims.client_id)
    {
        return Err(OidcError::with_description(
            ErrorReason::InvalidGrant,
            "client_id is mismatch",
        ));
    }
    if claims.redirect_uri != redirect_uri {
        return Err(OidcError::invalid_request("redirect_uri is mismatch"));
    }

    let subject = claims.standard.sub.as_str();
    let scope = granted_scope(&claims.scope);
    let access_token = provider
        .tokens
        .create_access_token(subject, &claims.client_id, &scope, claims.auth_time)
        .map_err(|e| OidcError::server_error("failed to create access token").caused_by(e))?;

    let userinfo = provider
        .userinfo(subject, &claims.scope)
        .await
        .map_err(|e| match e {
            DirectoryError::UserNotFound | DirectoryError::MultipleUsersFound => {
                OidcError::with_description(ErrorReason::InvalidGrant, "user was not found or disabled")
                    .caused_by(e)
            }
            e => OidcError::server_error("failed to get user information").caused_by(e),
        })?;

    let id_token = provider
        .tokens
        .create_id_token(IdTokenRequest {
            subject,
            client_id: &claims.client_id,
            nonce: claims.nonce.as_deref(),
            auth_time: claims.auth_time,
            code: Some(code),
            access_token: Some(&access_token),
            userinfo,
        })
        .map_err(|e| OidcError::server_error("failed to create id_token").caused_by(e))?;

    tracing::info!(client_id = %claims.client_id, username = %subject, "issued tokens");
    Ok(TokenResponse {
        token_type: "Bearer".to_string(),
        access_token,
        id_token,
        expires_in: provider.tokens.ttl().token.as_secs(),
        scope: scope.canonical(),
    })
}
