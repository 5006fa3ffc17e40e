//! RP-initiated logout.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use lauth_integration_tests::{TestEnv, CLIENT_ID, CLIENT_SECRET, REDIRECT_URI};
use lauth_protocol_oidc::SSO_COOKIE_NAME;

/// Logs in through the code flow and returns the SSO cookie and an id_token.
async fn signed_in(env: &TestEnv) -> (String, String) {
    let (code, redirect) = env.authorize_code("openid", "").await;
    let cookie = redirect.sso_cookie().unwrap();
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
    let id_token = response.json()["id_token"].as_str().unwrap().to_string();
    (cookie, id_token)
}

#[tokio::test]
async fn logout_clears_the_session() {
    let env = TestEnv::new();
    let (cookie, id_token) = signed_in(&env).await;

    let response = env
        .post("/logout", &[("id_token_hint", id_token.as_str())], Some(&cookie))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert!(response.text().contains("logged out"), "{}", response.text());

    let cleared = response.set_cookie(SSO_COOKIE_NAME).unwrap();
    assert!(cleared.starts_with(&format!("{SSO_COOKIE_NAME}=;")), "{cleared}");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");
    assert!(cleared.contains("HttpOnly"), "{cleared}");
    assert!(cleared.contains("Path=/"), "{cleared}");

    let response = env
        .post("/logout", &[("id_token_hint", id_token.as_str())], None)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let page = response.text();
    assert!(page.contains("invalid_request"), "{page}");
    assert!(page.contains("user not logged in"), "{page}");
}

#[tokio::test]
async fn logout_redirects_with_state() {
    let env = TestEnv::new();
    let (cookie, id_token) = signed_in(&env).await;

    let response = env
        .get(
            "/logout",
            &[
                ("id_token_hint", id_token.as_str()),
                ("post_logout_redirect_uri", REDIRECT_URI),
                ("state", "bye"),
            ],
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());
    assert_eq!(response.query_param("state").as_deref(), Some("bye"));
    assert!(response.location().as_str().starts_with(REDIRECT_URI));

    let response = env
        .get(
            "/logout",
            &[
                ("id_token_hint", id_token.as_str()),
                ("post_logout_redirect_uri", REDIRECT_URI),
                ("state", "bye"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(response.query_param("error").as_deref(), Some("invalid_request"));
    assert_eq!(response.query_param("state").as_deref(), Some("bye"));
}

#[tokio::test]
async fn logout_refuses_unregistered_redirects() {
    let env = TestEnv::new();
    let (cookie, id_token) = signed_in(&env).await;

    let response = env
        .get(
            "/logout",
            &[
                ("id_token_hint", id_token.as_str()),
                ("post_logout_redirect_uri", "http://evil.example.com/"),
            ],
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("post_logout_redirect_uri is not registered"));
    assert!(response.set_cookie(SSO_COOKIE_NAME).is_none());
}

#[tokio::test]
async fn logout_requires_a_hint() {
    let env = TestEnv::new();

    let response = env.get("/logout", &[], None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("id_token_hint is required"));

    let response = env.get("/logout", &[("id_token_hint", "junk")], None).await;
    assert!(response.text().contains("invalid id_token_hint"), "{}", response.text());
}

#[tokio::test]
async fn bad_hint_carries_bearer_challenge() {
    let env = TestEnv::new();

    let response = env.post("/logout", &[("id_token_hint", "garbage")], None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let challenge = response.headers[axum::http::header::WWW_AUTHENTICATE]
        .to_str()
        .unwrap();
    assert!(challenge.starts_with("Bearer error=\"invalid_token\""), "{challenge}");
}
