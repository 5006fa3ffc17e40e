//! Implicit and hybrid flows.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use lauth_integration_tests::{TestEnv, CLIENT_ID, REDIRECT_URI};

#[tokio::test]
async fn token_and_id_token_in_fragment() {
    let env = TestEnv::with_config("allow_implicit_flow: true\n");

    let response = env
        .login(&[
            ("response_type", "token id_token"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("scope", "openid email"),
            ("nonce", "This Is Nonce"),
            ("state", "some-state"),
        ])
        .await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());
    assert_eq!(response.location().query(), None);

    let access_token = response.fragment_param("access_token").unwrap();
    let id_token = response.fragment_param("id_token").unwrap();
    assert_eq!(response.fragment_param("token_type").as_deref(), Some("Bearer"));
    assert_eq!(response.fragment_param("state").as_deref(), Some("some-state"));
    assert_eq!(response.fragment_param("code"), None);

    let claims = env.tokens().parse_id_token(&id_token, CLIENT_ID).unwrap();
    assert_eq!(claims.nonce.as_deref(), Some("This Is Nonce"));
    assert_eq!(
        claims.at_hash.as_deref(),
        Some(lauth_crypto::left_half_hash(&access_token).as_str())
    );
    assert_eq!(claims.c_hash, None);
    assert_eq!(claims.userinfo["email"], "m@crat.jp");

    let access = env.tokens().parse_access_token(&access_token).unwrap();
    assert_eq!(access.standard.sub, "macrat");
}

#[tokio::test]
async fn hybrid_flow_hashes_the_code() {
    let env = TestEnv::with_config("allow_implicit_flow: true\n");

    let response = env
        .login(&[
            ("response_type", "code id_token"),
            ("client_id", CLIENT_ID),
            ("redirect_uri", REDIRECT_URI),
            ("nonce", "abc"),
        ])
        .await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());

    let code = response.fragment_param("code").unwrap();
    let id_token = response.fragment_param("id_token").unwrap();
    let claims = env.tokens().parse_id_token(&id_token, CLIENT_ID).unwrap();
    assert_eq!(
        claims.c_hash.as_deref(),
        Some(lauth_crypto::left_half_hash(&code).as_str())
    );
    assert_eq!(claims.at_hash, None);
    assert!(response.fragment_param("expires_in").is_some());
}

#[tokio::test]
async fn implicit_flow_is_off_by_default() {
    let env = TestEnv::new();

    let response = env
        .get(
            "/login",
            &[
                ("response_type", "token"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
                ("state", "s"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.fragment_param("error").as_deref(),
        Some("unsupported_response_type")
    );
    assert_eq!(response.fragment_param("state").as_deref(), Some("s"));
}
