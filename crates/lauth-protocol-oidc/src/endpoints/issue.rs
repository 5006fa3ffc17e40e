//! Authorization response assembly.
//!
//! Mints whatever `response_type` asks for, refreshes the SSO cookie and
//! redirects back to the client.

use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use lauth_core::StringSet;

use crate::claims::SsoTokenClaims;
use crate::error::{place_parameters, ErrorReason, OidcResult};
use crate::request::AuthorizationRequest;
use crate::token::{now, IdTokenRequest};
use crate::types::ResponseType;

use super::dispatch::{count, found, HtmlError};
use super::sso;
use super::state::Provider;

/// How the user was authenticated for this response.
pub(crate) enum Authentication {
    /// Password checked just now.
    Password,
    /// An existing SSO session was reused.
    Sso(SsoTokenClaims),
}

impl Authentication {
    fn auth_time(&self, now: i64) -> i64 {
        match self {
            Self::Password => now,
            Self::Sso(claims) => claims.auth_time,
        }
    }
}

/// Access token scope: the requested scope plus `openid`.
pub(crate) fn granted_scope(scope: &StringSet) -> StringSet {
    StringSet::parse("openid").union(scope)
}

fn parameters(
    provider: &Provider,
    req: &AuthorizationRequest,
    subject: &str,
    auth_time: i64,
    userinfo: Option<serde_json::Map<String, serde_json::Value>>,
) -> OidcResult<Vec<(&'static str, String)>> {
    let tokens = &provider.tokens;
    let mut params = Vec::new();
    if let Some(state) = &req.state {
        params.push(("state", state.clone()));
    }

    let code = if req.wants(ResponseType::Code) {
        let code = tokens
            .create_code(
                subject,
                &req.client_id,
                &req.redirect_uri,
                &req.scope,
                req.nonce.as_deref(),
                auth_time,
            )
            .map_err(|e| req.error(ErrorReason::ServerError, "failed to create code").caused_by(e))?;
        params.push(("code", code.clone()));
        Some(code)
    } else {
        None
    };

    let expires_in = tokens.ttl().token.as_secs().to_string();

    let access_token = if req.wants(ResponseType::Token) {
        let scope = granted_scope(&req.scope);
        let token = tokens
            .create_access_token(subject, &req.client_id, &scope, auth_time)
            .map_err(|e| {
                req.error(ErrorReason::ServerError, "failed to create access token")
                    .caused_by(e)
            })?;
        params.push(("token_type", "Bearer".to_string()));
        params.push(("access_token", token.clone()));
        params.push(("scope", scope.canonical()));
        params.push(("expires_in", expires_in.clone()));
        Some(token)
    } else {
        None
    };

    if let Some(userinfo) = userinfo {
        let id_token = tokens
            .create_id_token(IdTokenRequest {
                subject,
                client_id: &req.client_id,
                nonce: req.nonce.as_deref(),
                auth_time,
                code: code.as_deref(),
                access_token: access_token.as_deref(),
                userinfo,
            })
            .map_err(|e| {
                req.error(ErrorReason::ServerError, "failed to create id_token")
                    .caused_by(e)
            })?;
        params.push(("id_token", id_token));
        if access_token.is_none() {
            params.push(("expires_in", expires_in));
        }
    }

    Ok(params)
}

/// Builds the redirect for an authenticated user.
pub(crate) async fn respond(
    provider: &Provider,
    jar: CookieJar,
    req: &AuthorizationRequest,
    subject: &str,
    authentication: Authentication,
) -> Result<Response, HtmlError> {
    let now = now();
    let auth_time = authentication.auth_time(now);

    let userinfo = if req.wants(ResponseType::IdToken) {
        let claims = provider.userinfo(subject, &req.scope).await.map_err(|e| {
            req.error(ErrorReason::ServerError, "failed to get user information")
                .caused_by(e)
        })?;
        Some(claims)
    } else {
        None
    };

    let params = parameters(provider, req, subject, auth_time, userinfo)?;
    let location = place_parameters(&req.redirect_url, &params, !req.uses_query());

    let jar = if provider.tokens.ttl().sso.is_zero() {
        jar
    } else {
        let cookie = sso_cookie(provider, &jar, req, subject, auth_time, &authentication)?;
        jar.add(cookie)
    };

    count("lauth_authz_total", true);
    tracing::info!(client_id = %req.client_id, username = %subject, response_type = %req.response_type, "authorized");
    Ok((jar, found(location.as_str())).into_response())
}

fn sso_cookie(
    provider: &Provider,
    jar: &CookieJar,
    req: &AuthorizationRequest,
    subject: &str,
    auth_time: i64,
    authentication: &Authentication,
) -> Result<axum_extra::extract::cookie::Cookie<'static>, HtmlError> {
    let expires_at = match authentication {
        Authentication::Sso(claims) => claims.standard.exp,
        Authentication::Password => provider.tokens.sso_expiry(),
    };

    let mut azp = sso::current(provider, jar)
        .filter(|claims| claims.standard.sub == subject)
        .map(|claims| claims.azp)
        .unwrap_or_default();
    if !azp.contains(&req.client_id) {
        azp.push(req.client_id.clone());
    }

    let token = provider
        .tokens
        .create_sso_token(subject, azp, auth_time, expires_at)
        .map_err(|e| {
            req.error(ErrorReason::ServerError, "failed to create SSO token")
                .caused_by(e)
        })?;
    Ok(sso::issue(provider, token, expires_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{LOCATION, SET_COOKIE};
    use axum::http::StatusCode;
    use url::Url;

    use crate::endpoints::state::tests::{provider, provider_with};
    use crate::request::AuthorizationParams;

    fn request(provider: &Provider, response_type: &str, extra: &[(&str, &str)]) -> AuthorizationRequest {
        let mut query = vec![
            ("response_type", response_type),
            ("client_id", "some_client_id"),
            ("redirect_uri", "http://some-client.example.com/callback"),
            ("scope", "openid profile"),
            ("state", "xyz"),
        ];
        query.extend_from_slice(extra);
        let encoded = serde_urlencoded::to_string(&query).unwrap();
        let params: AuthorizationParams = serde_urlencoded::from_str(&encoded).unwrap();
        params.validate(&provider.config, &provider.tokens).unwrap()
    }

    fn location(response: &Response) -> Url {
        Url::parse(response.headers()[LOCATION].to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn code_goes_in_query() {
        let provider = provider();
        let req = request(&provider, "code", &[("nonce", "n")]);
        let response = respond(&provider, CookieJar::new(), &req, "macrat", Authentication::Password)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let url = location(&response);
        assert_eq!(url.fragment(), None);
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(query[0], ("state".to_string(), "xyz".to_string()));
        let code = &query.iter().find(|(k, _)| k == "code").unwrap().1;
        let claims = provider.tokens.parse_code(code).unwrap();
        assert_eq!(claims.standard.sub, "macrat");
        assert_eq!(claims.nonce.as_deref(), Some("n"));
        assert!(response.headers().get(SET_COOKIE).is_some());
    }

    #[tokio::test]
    async fn hybrid_goes_in_fragment_with_hashes() {
        let provider = provider_with("allow_implicit_flow: true\n");
        let req = request(&provider, "code id_token token", &[]);
        let response = respond(&provider, CookieJar::new(), &req, "macrat", Authentication::Password)
            .await
            .unwrap();
        let url = location(&response);
        assert_eq!(url.query(), None);
        let fragment: Vec<(String, String)> =
            url::form_urlencoded::parse(url.fragment().unwrap().as_bytes())
                .into_owned()
                .collect();
        let get = |name: &str| fragment.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone());

        assert_eq!(get("token_type").as_deref(), Some("Bearer"));
        assert_eq!(get("expires_in").as_deref(), Some("3600"));
        assert_eq!(get("scope").as_deref(), Some("openid profile"));

        let id_token = provider
            .tokens
            .parse_id_token(&get("id_token").unwrap(), "some_client_id")
            .unwrap();
        assert_eq!(
            id_token.c_hash,
            Some(lauth_crypto::left_half_hash(&get("code").unwrap()))
        );
        assert_eq!(
            id_token.at_hash,
            Some(lauth_crypto::left_half_hash(&get("access_token").unwrap()))
        );
        assert_eq!(id_token.userinfo["name"], "SHIDA Yuuma");
    }

    #[tokio::test]
    async fn sso_reuse_keeps_auth_time_and_expiry() {
        let provider = provider();
        let expires_at = now() + 1000;
        let token = provider
            .tokens
            .create_sso_token("macrat", vec!["other".to_string()], 42, expires_at)
            .unwrap();
        let jar = CookieJar::new().add(sso::issue(&provider, token, expires_at));
        let claims = sso::current(&provider, &jar).unwrap();

        let req = request(&provider, "code", &[]);
        let response = respond(&provider, jar, &req, "macrat", Authentication::Sso(claims))
            .await
            .unwrap();

        let code = location(&response)
            .query_pairs()
            .find(|(k, _)| k == "code")
            .unwrap()
            .1
            .into_owned();
        assert_eq!(provider.tokens.parse_code(&code).unwrap().auth_time, 42);

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        let value = cookie
            .strip_prefix("lauth_token=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let refreshed = provider.tokens.parse_sso_token(value).unwrap();
        assert_eq!(refreshed.auth_time, 42);
        assert_eq!(refreshed.standard.exp, expires_at);
        assert_eq!(refreshed.azp, vec!["other".to_string(), "some_client_id".to_string()]);
    }

    #[tokio::test]
    async fn password_login_shares_auth_time_with_cookie() {
        let provider = provider();
        let req = request(&provider, "code", &[]);
        let response = respond(&provider, CookieJar::new(), &req, "macrat", Authentication::Password)
            .await
            .unwrap();

        let code = location(&response)
            .query_pairs()
            .find(|(k, _)| k == "code")
            .unwrap()
            .1
            .into_owned();
        let code = provider.tokens.parse_code(&code).unwrap();

        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        let value = cookie
            .strip_prefix("lauth_token=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        let sso = provider.tokens.parse_sso_token(value).unwrap();
        assert_eq!(sso.auth_time, code.auth_time);
    }

    #[tokio::test]
    async fn no_cookie_when_sso_disabled() {
        let provider = provider_with("");
        let mut config = provider.config.clone();
        config.ttl.sso = lauth_core::HumanDuration::from_secs(0);
        let tokens = crate::token::TokenManager::new(
            config.issuer.clone(),
            config.ttl,
            crate::token::tests::test_key(),
        )
        .unwrap();
        let provider = Provider::new(config, tokens, provider.directory.clone()).unwrap();

        let req = request(&provider, "code", &[]);
        let response = respond(&provider, CookieJar::new(), &req, "macrat", Authentication::Password)
            .await
            .unwrap();
        assert!(response.headers().get(SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn missing_user_is_server_error_redirect() {
        let provider = provider_with("allow_implicit_flow: true\n");
        let req = request(&provider, "id_token", &[]);
        let err = respond(&provider, CookieJar::new(), &req, "nobody", Authentication::Password)
            .await
            .unwrap_err();
        assert_eq!(err.0.reason, ErrorReason::ServerError);
        assert!(err.0.redirect_location().is_some());
    }
}
