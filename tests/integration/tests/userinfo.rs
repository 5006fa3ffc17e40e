//! Userinfo endpoint.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use lauth_core::StringSet;
use lauth_integration_tests::{TestEnv, CLIENT_ID, ORIGIN};
use lauth_protocol_oidc::token::now;

fn access_token(env: &TestEnv, subject: &str, scope: &str) -> String {
    env.tokens()
        .create_access_token(subject, CLIENT_ID, &StringSet::parse(scope), now())
        .unwrap()
}

fn userinfo_request(method: Method, token: Option<&str>, origin: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/login/userinfo");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    if let Some(origin) = origin {
        builder = builder.header("origin", origin);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn claims_follow_scope() {
    let env = TestEnv::new();
    let token = access_token(&env, "macrat", "openid profile email");

    let response = env
        .send(userinfo_request(Method::GET, Some(&token), None))
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert_eq!(
        response.json(),
        json!({
            "sub": "macrat",
            "name": "SHIDA Yuuma",
            "given_name": "yuuma",
            "family_name": "shida",
            "email": "m@crat.jp",
        })
    );

    let token = access_token(&env, "macrat", "openid");
    let response = env.send(userinfo_request(Method::POST, Some(&token), None)).await;
    assert_eq!(response.json(), json!({ "sub": "macrat" }));
}

#[tokio::test]
async fn token_in_form_body() {
    let env = TestEnv::new();
    let token = access_token(&env, "macrat", "openid email");

    let response = env
        .post("/login/userinfo", &[("access_token", token.as_str())], None)
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert_eq!(response.json()["email"], "m@crat.jp");
}

#[tokio::test]
async fn rejected_tokens() {
    let env = TestEnv::new();

    let response = env.send(userinfo_request(Method::GET, Some("garbage"), None)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "invalid_token");
    let challenge = response.headers["www-authenticate"].to_str().unwrap();
    assert!(challenge.starts_with(r#"Bearer error="invalid_token""#), "{challenge}");

    let code = env
        .tokens()
        .create_code("macrat", CLIENT_ID, "http://some-client.example.com/callback", &StringSet::parse("openid"), None, now())
        .unwrap();
    let response = env.send(userinfo_request(Method::GET, Some(&code), None)).await;
    assert_eq!(response.json()["error"], "invalid_token");

    let ghost = access_token(&env, "nobody", "openid");
    let response = env.send(userinfo_request(Method::GET, Some(&ghost), None)).await;
    assert_eq!(response.json()["error"], "invalid_token");
    assert_eq!(response.json()["error_description"], "user was not found or disabled");
}

#[tokio::test]
async fn cors_for_registered_origins() {
    let env = TestEnv::new();
    let token = access_token(&env, "macrat", "openid");

    let response = env
        .send(userinfo_request(Method::GET, Some(&token), Some(ORIGIN)))
        .await;
    assert_eq!(response.headers["access-control-allow-origin"], ORIGIN);
    assert_eq!(response.headers["vary"], "Origin");

    let response = env
        .send(userinfo_request(Method::GET, Some(&token), Some("http://evil.example.com")))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!response.headers.contains_key("access-control-allow-origin"));

    let response = env
        .send(userinfo_request(Method::OPTIONS, None, Some(ORIGIN)))
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.headers["access-control-allow-origin"], ORIGIN);
    assert_eq!(response.headers["access-control-allow-methods"], "GET, POST, OPTIONS");

    let response = env
        .send(userinfo_request(Method::OPTIONS, None, Some("http://evil.example.com")))
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "access_denied");
}
