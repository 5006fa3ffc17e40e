//! Authorization code flow and SSO reuse.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use lauth_integration_tests::{TestEnv, CLIENT_ID, CLIENT_SECRET, ISSUER, REDIRECT_URI};
use lauth_protocol_oidc::TokenResponse;

#[tokio::test]
async fn code_flow_issues_tokens() {
    let env = TestEnv::new();

    let (code, redirect) = env.authorize_code("profile", "n-0S6_WzA2Mj").await;
    let location = redirect.location();
    assert_eq!(
        format!("{}://{}{}", location.scheme(), location.authority(), location.path()),
        REDIRECT_URI
    );
    assert_eq!(location.fragment(), None);
    assert!(redirect.sso_cookie().is_some(), "login sets the SSO cookie");

    let response = env
        .post(
            "/login/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
                ("redirect_uri", REDIRECT_URI),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert_eq!(response.headers["cache-control"], "no-store");
    assert_eq!(response.headers["pragma"], "no-cache");

    let tokens: TokenResponse = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 3600);
    assert_eq!(tokens.scope, "openid profile");

    let id_token = env.tokens().parse_id_token(&tokens.id_token, CLIENT_ID).unwrap();
    assert_eq!(id_token.standard.iss, ISSUER);
    assert!(id_token.standard.aud.contains(CLIENT_ID));
    assert_eq!(id_token.standard.sub, "macrat");
    assert_eq!(id_token.nonce.as_deref(), Some("n-0S6_WzA2Mj"));
    assert_eq!(
        id_token.c_hash.as_deref(),
        Some(lauth_crypto::left_half_hash(&code).as_str())
    );
    assert_eq!(
        id_token.at_hash.as_deref(),
        Some(lauth_crypto::left_half_hash(&tokens.access_token).as_str())
    );
    assert_eq!(id_token.userinfo["name"], "SHIDA Yuuma");

    let access = env.tokens().parse_access_token(&tokens.access_token).unwrap();
    assert_eq!(access.scope.canonical(), "openid profile");
}

#[tokio::test]
async fn code_flow_with_basic_client_auth() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let env = TestEnv::new();
    let (code, _) = env.authorize_code("openid", "").await;

    let body = serde_urlencoded::to_string([
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("redirect_uri", REDIRECT_URI),
    ])
    .unwrap();
    let secret = CLIENT_SECRET.replace(' ', "%20");
    let credentials = STANDARD.encode(format!("{CLIENT_ID}:{secret}"));
    let request = axum::http::Request::post("/login/token")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("authorization", format!("Basic {credentials}"))
        .body(axum::body::Body::from(body))
        .unwrap();

    let response = env.send(request).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert_eq!(response.json()["scope"], "openid");
}

#[tokio::test]
async fn sso_cookie_skips_the_login_form() {
    let env = TestEnv::new();
    let (_, first) = env.authorize_code("openid", "").await;
    let cookie = first.sso_cookie().unwrap();
    let sso = env
        .tokens()
        .parse_sso_token(cookie.split_once('=').unwrap().1)
        .unwrap();
    assert_eq!(sso.azp, vec![CLIENT_ID.to_string()]);

    let response = env
        .get(
            "/login",
            &[
                ("response_type", "code"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
            ],
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());

    let code = env
        .tokens()
        .parse_code(&response.query_param("code").unwrap())
        .unwrap();
    assert_eq!(code.standard.sub, "macrat");
    assert_eq!(code.auth_time, sso.auth_time);

    let refreshed = response.sso_cookie().unwrap();
    let refreshed = env
        .tokens()
        .parse_sso_token(refreshed.split_once('=').unwrap().1)
        .unwrap();
    assert_eq!(refreshed.auth_time, sso.auth_time);
    assert_eq!(refreshed.standard.exp, sso.standard.exp);
}

#[tokio::test]
async fn code_cannot_cross_redirect_uris() {
    let env = TestEnv::new();
    let (code, _) = env.authorize_code("openid", "").await;

    let response = env
        .post(
            "/login/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
                ("redirect_uri", "http://some-client.example.com/other"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_request");
}
