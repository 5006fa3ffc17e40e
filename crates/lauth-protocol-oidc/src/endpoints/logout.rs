//! RP-initiated logout.
//!
//! Implements GET/POST `/logout`. The caller names the session with an
//! `id_token_hint` and must still hold the matching SSO cookie.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use url::Url;

use lauth_core::StringSet;

use crate::error::{place_parameters, ErrorReason, OidcError, OidcResult};
use crate::request::LogoutParams;

use super::dispatch::{count, found, HtmlError};
use super::extract::Bound;
use super::pages::{render, LogoutPage};
use super::sso;
use super::state::{OidcState, Provider};

/// GET and POST `/logout`
pub(crate) async fn logout(
    State(state): State<OidcState>,
    jar: CookieJar,
    Bound(params): Bound<LogoutParams>,
) -> Response {
    let provider = &state.provider;
    let result = end_session(provider, &jar, params);
    count("lauth_logout_total", result.is_ok());

    let redirect = match result {
        Ok(redirect) => redirect,
        Err(e) => return HtmlError(e).into_response(),
    };
    let jar = jar.add(sso::clear(provider));

    match redirect {
        Some(location) => (jar, found(location.as_str())).into_response(),
        None => {
            let page = LogoutPage {
                issuer: provider.issuer.as_str(),
            };
            (jar, render(StatusCode::OK, &page)).into_response()
        }
    }
}

/// Validates the request. Returns where to send the user agent, if anywhere.
fn end_session(
    provider: &Provider,
    jar: &CookieJar,
    params: LogoutParams,
) -> OidcResult<Option<Url>> {
    let hint = params
        .id_token_hint
        .filter(|h| !h.is_empty())
        .ok_or_else(|| OidcError::invalid_request("id_token_hint is required"))?;
    let claims = provider
        .tokens
        .parse_id_token_hint(&hint)
        .map_err(|e| OidcError::invalid_token(format!("invalid id_token_hint: {e}")))?;
    let client_id = claims.client_id().unwrap_or_default();

    let redirect = match params.post_logout_redirect_uri.filter(|r| !r.is_empty()) {
        None => None,
        Some(raw) => {
            let url = Url::parse(&raw).map_err(|_| {
                OidcError::invalid_request("post_logout_redirect_uri is not absolute URL")
            })?;
            let registered = provider
                .config
                .client
                .get(client_id)
                .is_some_and(|c| c.redirect_uri.matches(&raw));
            if !registered {
                return Err(OidcError::with_description(
                    ErrorReason::UnauthorizedClient,
                    "post_logout_redirect_uri is not registered",
                ));
            }
            Some(url)
        }
    };

    let logged_in = sso::current(provider, jar).is_some_and(|sso| sso.standard.sub == claims.standard.sub);
    if !logged_in {
        let err = OidcError::invalid_request("user not logged in");
        return Err(match &redirect {
            Some(url) => err.redirect_to(url, &StringSet::new(), params.state.as_deref()),
            None => err,
        });
    }

    tracing::info!(client_id, username = %claims.standard.sub, "logged out");
    Ok(redirect.map(|url| match params.state.as_deref() {
        Some(state) => place_parameters(&url, &[("state", state)], false),
        None => url,
    }))
}
