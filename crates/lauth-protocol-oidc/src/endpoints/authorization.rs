//! Authorization endpoint handler.
//!
//! Implements GET and POST `/login`. GET reuses an SSO session or shows the
//! login form; POST checks the form session and the password, then issues
//! the response the client asked for.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use lauth_ldap::DirectoryError;

use crate::error::ErrorReason;
use crate::request::{AuthorizationParams, AuthorizationRequest};
use crate::token::now;
use crate::types::Prompt;

use super::dispatch::{count, HtmlError};
use super::extract::{Bound, ClientIp};
use super::issue::{respond, Authentication};
use super::pages::{render, LoginPage};
use super::sso;
use super::state::{OidcState, Provider};

/// GET `/login`
pub(crate) async fn authorize_get(
    State(state): State<OidcState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Bound(params): Bound<AuthorizationParams>,
) -> Response {
    let provider = &state.provider;
    let result = match params.validate(&provider.config, &provider.tokens) {
        Ok(req) if req.username.is_some() || req.password.is_some() => Err(req
            .error(
                ErrorReason::InvalidRequest,
                "can't set username or password in GET method",
            )
            .into()),
        Ok(req) => interactive(provider, &ip, jar, &req).await,
        Err(e) => Err(e.into()),
    };
    finish(result)
}

/// POST `/login`
pub(crate) async fn authorize_post(
    State(state): State<OidcState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Bound(params): Bound<AuthorizationParams>,
) -> Response {
    let provider = &state.provider;
    let submitted = params.session.is_some() || params.has_credentials();
    let result = match params.validate(&provider.config, &provider.tokens) {
        Ok(req) if submitted => login(provider, &ip, jar, &req).await,
        Ok(req) => interactive(provider, &ip, jar, &req).await,
        Err(e) => Err(e.into()),
    };
    finish(result)
}

fn finish(result: Result<Response, HtmlError>) -> Response {
    result.unwrap_or_else(|e| {
        count("lauth_authz_total", false);
        e.into_response()
    })
}

/// Responds through the SSO session when the request allows it.
///
/// Returns `Ok(None)` when the user has to log in with a password.
async fn try_sso(
    provider: &Provider,
    jar: &CookieJar,
    req: &AuthorizationRequest,
) -> Result<Option<Response>, HtmlError> {
    if let Some(claims) = sso::current(provider, jar) {
        if req.allows_sso(claims.auth_time, now()) {
            let subject = claims.standard.sub.clone();
            tracing::debug!(client_id = %req.client_id, username = %subject, "reusing SSO session");
            let response = respond(provider, jar.clone(), req, &subject, Authentication::Sso(claims)).await?;
            return Ok(Some(response));
        }
    }

    if req.prompts(Prompt::None) {
        return Err(req
            .error(ErrorReason::LoginRequired, "login is required")
            .into());
    }
    Ok(None)
}

/// Reuses the SSO session when allowed, otherwise shows the login form.
async fn interactive(
    provider: &Provider,
    ip: &str,
    jar: CookieJar,
    req: &AuthorizationRequest,
) -> Result<Response, HtmlError> {
    if let Some(response) = try_sso(provider, &jar, req).await? {
        return Ok(response);
    }
    login_form(provider, ip, req, None, StatusCode::OK)
}

/// Handles a submitted login form.
async fn login(
    provider: &Provider,
    ip: &str,
    jar: CookieJar,
    req: &AuthorizationRequest,
) -> Result<Response, HtmlError> {
    let session_ok = req.session.as_deref().is_some_and(|token| {
        provider
            .tokens
            .parse_login_token(token)
            .is_ok_and(|claims| claims.standard.sub == ip && claims.client_id == req.client_id)
    });
    if !session_ok {
        tracing::debug!(client_id = %req.client_id, ip, "login form session is invalid");
        return login_form(provider, ip, req, Some("invalid session"), StatusCode::BAD_REQUEST);
    }

    if let Some(response) = try_sso(provider, &jar, req).await? {
        return Ok(response);
    }

    let (Some(username), Some(password)) = (req.username.as_deref(), req.password.as_deref())
    else {
        return login_form(
            provider,
            ip,
            req,
            Some("missing username or password"),
            StatusCode::BAD_REQUEST,
        );
    };

    match provider.login(username, password).await {
        Ok(()) => {
            count("lauth_login_total", true);
            tracing::info!(client_id = %req.client_id, username, ip, "login succeeded");
            respond(provider, jar, req, username, Authentication::Password).await
        }
        Err(e) if e.is_user_error() => {
            count("lauth_login_total", false);
            provider.login_delay.wait().await;
            tracing::info!(client_id = %req.client_id, username, ip, reason = %e, "login failed");
            login_form(
                provider,
                ip,
                req,
                Some("invalid username or password"),
                StatusCode::FORBIDDEN,
            )
        }
        Err(e) => Err(directory_failure(req, e)),
    }
}

fn directory_failure(req: &AuthorizationRequest, e: DirectoryError) -> HtmlError {
    req.error(ErrorReason::ServerError, "failed to connect to the user directory")
        .caused_by(e)
        .into()
}

/// Renders the login form with a fresh form session bound to `ip`.
fn login_form(
    provider: &Provider,
    ip: &str,
    req: &AuthorizationRequest,
    error: Option<&str>,
    status: StatusCode,
) -> Result<Response, HtmlError> {
    let session = provider
        .tokens
        .create_login_token(ip, &req.client_id)
        .map_err(|e| {
            req.error(ErrorReason::ServerError, "failed to create login session")
                .caused_by(e)
        })?;

    let username = req
        .username
        .as_deref()
        .or(req.login_hint.as_deref())
        .unwrap_or_default();

    let page = LoginPage {
        issuer: provider.issuer.as_str(),
        client_name: provider.client_name(&req.client_id),
        action: &provider.config.endpoint.authorization,
        hidden: req.hidden_fields(),
        username,
        error,
        session,
    };
    Ok(render(status, &page))
}
