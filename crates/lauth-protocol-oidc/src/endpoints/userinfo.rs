//! `UserInfo` endpoint handler.
//!
//! Implements GET/POST `/login/userinfo` for returning user claims, and the
//! CORS preflight for registered client origins.

use axum::extract::State;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
    VARY,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};

use lauth_ldap::DirectoryError;

use crate::error::{ErrorReason, OidcError, OidcResult};
use crate::request::UserinfoParams;

use super::dispatch::{count, JsonError, NO_STORE};
use super::extract::{bearer_token, BindError, Bound};
use super::state::{OidcState, Provider};

/// The `Origin` header when some client allows it.
fn allowed_origin<'a>(provider: &Provider, headers: &'a HeaderMap) -> Option<&'a HeaderValue> {
    let origin = headers.get(ORIGIN)?;
    let text = origin.to_str().ok()?;
    provider
        .config
        .client
        .any_cors_origin_matches(text)
        .then_some(origin)
}

fn with_cors(provider: &Provider, headers: &HeaderMap, mut response: Response) -> Response {
    if let Some(origin) = allowed_origin(provider, headers) {
        let out = response.headers_mut();
        out.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        out.insert(VARY, HeaderValue::from_static("Origin"));
    }
    response
}

/// GET `/login/userinfo`
pub(crate) async fn userinfo_get(State(state): State<OidcState>, headers: HeaderMap) -> Response {
    let token = bearer_token(&headers).map(str::to_string);
    finish(&state.provider, &headers, token).await
}

/// POST `/login/userinfo`
///
/// The token may also travel in the `access_token` form field.
pub(crate) async fn userinfo_post(
    State(state): State<OidcState>,
    headers: HeaderMap,
    params: Result<Bound<UserinfoParams>, BindError>,
) -> Response {
    let provider = &state.provider;
    let form_token = match params {
        Ok(Bound(params)) => params.access_token.filter(|t| !t.is_empty()),
        Err(e) => return with_cors(provider, &headers, JsonError(e.0).into_response()),
    };
    let token = bearer_token(&headers).map(str::to_string).or(form_token);
    finish(provider, &headers, token).await
}

async fn finish(provider: &Provider, headers: &HeaderMap, token: Option<String>) -> Response {
    let result = claims(provider, token.as_deref()).await;
    count("lauth_userinfo_total", result.is_ok());
    let response = match result {
        Ok(claims) => (StatusCode::OK, NO_STORE, Json(claims)).into_response(),
        Err(e) => JsonError(e).into_response(),
    };
    with_cors(provider, headers, response)
}

async fn claims(provider: &Provider, token: Option<&str>) -> OidcResult<Map<String, Value>> {
    let token = token.ok_or_else(|| OidcError::invalid_token("bearer token is required"))?;
    let access = provider
        .tokens
        .parse_access_token(token)
        .map_err(|e| OidcError::invalid_token(e.to_string()))?;

    let subject = access.standard.sub.as_str();
    provider
        .userinfo(subject, &access.scope)
        .await
        .map_err(|e| match e {
            DirectoryError::UserNotFound | DirectoryError::MultipleUsersFound => {
                OidcError::invalid_token("user was not found or disabled").caused_by(e)
            }
            e => OidcError::server_error("failed to get user information").caused_by(e),
        })
}

/// OPTIONS `/login/userinfo`
pub(crate) async fn userinfo_preflight(
    State(state): State<OidcState>,
    headers: HeaderMap,
) -> Response {
    let provider = &state.provider;
    if allowed_origin(provider, &headers).is_none() {
        return JsonError(
            OidcError::with_description(ErrorReason::AccessDenied, "origin is not allowed")
                .with_status(403),
        )
        .into_response();
    }

    let response = (
        StatusCode::NO_CONTENT,
        [
            (ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
            (ACCESS_CONTROL_ALLOW_HEADERS, "Authorization, Content-Type"),
        ],
    )
        .into_response();
    with_cors(provider, &headers, response)
}
