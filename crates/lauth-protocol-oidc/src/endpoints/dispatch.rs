//! Error rendering.
//!
//! Handlers return an [`OidcError`] wrapped in the renderer the endpoint
//! uses: [`HtmlError`] for browser-facing endpoints, [`JsonError`] for the
//! token and userinfo endpoints. This is the only place that turns an error
//! record into a response.

use axum::http::header::{CACHE_CONTROL, LOCATION, PRAGMA, WWW_AUTHENTICATE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::{ErrorReason, OidcError};

use super::pages::{render, ErrorPage};

/// 302 to `location`.
pub(crate) fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => HtmlError(OidcError::server_error("invalid redirect location")).into_response(),
    }
}

/// Headers that keep token responses out of caches.
pub(crate) const NO_STORE: [(HeaderName, &str); 2] =
    [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")];

/// Increments an endpoint counter.
pub(crate) fn count(name: &'static str, ok: bool) {
    let result = if ok { "success" } else { "failure" };
    metrics::counter!(name, "result" => result).increment(1);
}

fn status_of(err: &OidcError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn log(err: &OidcError) {
    let cause = err.cause.as_ref().map(ToString::to_string);
    if err.reason == ErrorReason::ServerError {
        tracing::error!(reason = %err.reason, description = ?err.description, cause = ?cause, "request failed");
    } else {
        tracing::debug!(reason = %err.reason, description = ?err.description, cause = ?cause, "request rejected");
    }
}

/// Adds the `Bearer` challenge that every `invalid_token` response carries.
fn challenge(err: &OidcError, mut response: Response) -> Response {
    if err.reason != ErrorReason::InvalidToken {
        return response;
    }
    let value = format!(
        "Bearer error=\"invalid_token\",error_description=\"{}\"",
        err.description
            .as_deref()
            .unwrap_or_default()
            .replace(['"', '\\'], "'")
    );
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(WWW_AUTHENTICATE, value);
    }
    response
}

/// Renders as a redirect to the client when trusted, else an HTML page.
#[derive(Debug)]
pub struct HtmlError(pub OidcError);

impl From<OidcError> for HtmlError {
    fn from(err: OidcError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HtmlError {
    fn into_response(self) -> Response {
        let err = self.0;
        log(&err);

        if let Some(location) = err.redirect_location() {
            return found(location.as_str());
        }

        let page = ErrorPage {
            status: err.http_status(),
            error: err.reason.as_str(),
            description: err.description.as_deref(),
        };
        challenge(&err, render(status_of(&err), &page))
    }
}

/// Renders as a JSON error body.
#[derive(Debug)]
pub struct JsonError(pub OidcError);

impl From<OidcError> for JsonError {
    fn from(err: OidcError) -> Self {
        Self(err)
    }
}

impl IntoResponse for JsonError {
    fn into_response(self) -> Response {
        let err = self.0;
        log(&err);

        let response = (status_of(&err), NO_STORE, Json(err.to_error_response())).into_response();
        challenge(&err, response)
    }
}
