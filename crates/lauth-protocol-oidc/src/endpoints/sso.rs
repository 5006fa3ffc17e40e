//! SSO cookie.
//!
//! The cookie holds an SSO token. It is scoped to the issuer host, `Path=/`,
//! `HttpOnly`, and `Secure` when the issuer uses https.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::claims::SsoTokenClaims;

use super::state::Provider;

/// Cookie name.
pub const SSO_COOKIE_NAME: &str = "lauth_token";

fn build(provider: &Provider, value: String, max_age: i64) -> Cookie<'static> {
    let mut cookie = Cookie::build((SSO_COOKIE_NAME, value))
        .path("/")
        .http_only(true)
        .secure(provider.is_https())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age.max(0)));

    if let Some(host) = provider.issuer.host_str() {
        if !provider.config.omit_cookie_domain && host != "localhost" {
            cookie = cookie.domain(host.to_string());
        }
    }
    cookie.build()
}

/// Valid SSO claims from the request cookie, if any.
pub(crate) fn current(provider: &Provider, jar: &CookieJar) -> Option<SsoTokenClaims> {
    let cookie = jar.get(SSO_COOKIE_NAME)?;
    match provider.tokens.parse_sso_token(cookie.value()) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring invalid SSO cookie");
            None
        }
    }
}

/// Cookie carrying `token` until `expires_at`.
pub(crate) fn issue(provider: &Provider, token: String, expires_at: i64) -> Cookie<'static> {
    build(provider, token, expires_at - crate::token::now())
}

/// Empty cookie that expires immediately.
pub(crate) fn clear(provider: &Provider) -> Cookie<'static> {
    build(provider, String::new(), 0)
}
