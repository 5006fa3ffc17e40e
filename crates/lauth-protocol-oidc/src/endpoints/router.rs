//! OIDC router configuration.
//!
//! Provides the Axum router for all OIDC endpoints.

use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::error::{ErrorReason, OidcError};

use super::authorization::{authorize_get, authorize_post};
use super::discovery::{jwks, well_known};
use super::dispatch::{HtmlError, JsonError};
use super::logout::logout;
use super::state::OidcState;
use super::token::{token, token_preflight};
use super::userinfo::{userinfo_get, userinfo_post, userinfo_preflight};

async fn html_method_not_allowed() -> Response {
    HtmlError(OidcError::new(ErrorReason::MethodNotAllowed)).into_response()
}

async fn json_method_not_allowed() -> Response {
    JsonError(OidcError::new(ErrorReason::MethodNotAllowed)).into_response()
}

async fn page_not_found() -> Response {
    HtmlError(OidcError::new(ErrorReason::PageNotFound)).into_response()
}

/// Creates the OIDC protocol router.
///
/// # Endpoints
///
/// Paths come from `endpoint.*` in the configuration; defaults are shown.
///
/// | Method             | Path                                | Handler         |
/// |--------------------|-------------------------------------|-----------------|
/// | GET                | `/.well-known/openid-configuration` | `well_known`    |
/// | GET                | `/login/jwks`                       | `jwks`          |
/// | GET, POST          | `/login`                            | `authorize_*`   |
/// | POST, OPTIONS      | `/login/token`                      | `token`         |
/// | GET, POST, OPTIONS | `/login/userinfo`                   | `userinfo_*`    |
/// | GET, POST          | `/logout`                           | `logout`        |
///
/// Other methods get 405, rendered as HTML on the browser-facing endpoints
/// and as JSON elsewhere. Unknown paths get an HTML 404.
pub fn oidc_router(state: OidcState) -> Router {
    let endpoint = state.provider.config.endpoint.clone();

    Router::new()
        .route(
            "/.well-known/openid-configuration",
            get(well_known).fallback(json_method_not_allowed),
        )
        .route(&endpoint.jwks, get(jwks).fallback(json_method_not_allowed))
        .route(
            &endpoint.authorization,
            get(authorize_get)
                .post(authorize_post)
                .fallback(html_method_not_allowed),
        )
        .route(
            &endpoint.token,
            post(token)
                .options(token_preflight)
                .fallback(json_method_not_allowed),
        )
        .route(
            &endpoint.userinfo,
            get(userinfo_get)
                .post(userinfo_post)
                .options(userinfo_preflight)
                .fallback(json_method_not_allowed),
        )
        .route(
            &endpoint.logout,
            get(logout).post(logout).fallback(html_method_not_allowed),
        )
        .fallback(page_not_found)
        .with_state(state)
}
