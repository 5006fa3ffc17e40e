//! Token endpoint errors and browser blocking.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;

use lauth_integration_tests::{TestEnv, CLIENT_ID, CLIENT_SECRET, REDIRECT_URI};

#[tokio::test]
async fn browser_preflight_is_refused() {
    let env = TestEnv::new();
    let request = Request::options("/login/token")
        .header("origin", "http://x.example")
        .body(Body::empty())
        .unwrap();

    let response = env.send(request).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.json(),
        json!({
            "error": "access_denied",
            "error_description": "Origin header was set. You can't use token endpoint via browser.",
        })
    );
}

#[tokio::test]
async fn grant_and_client_errors() {
    let env = TestEnv::new();
    let (code, _) = env.authorize_code("openid", "").await;

    let cases: [(&[(&str, &str)], &str); 5] = [
        (&[("grant_type", "password")], "unsupported_grant_type"),
        (
            &[("grant_type", "authorization_code"), ("redirect_uri", REDIRECT_URI)],
            "invalid_request",
        ),
        (
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
            ],
            "invalid_request",
        ),
        (
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("client_id", CLIENT_ID),
                ("client_secret", "wrong"),
            ],
            "unauthorized_client",
        ),
        (
            &[
                ("grant_type", "authorization_code"),
                ("code", "not-a-code"),
                ("redirect_uri", REDIRECT_URI),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
            "invalid_grant",
        ),
    ];

    for (params, expected) in cases {
        let response = env.post("/login/token", params, None).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{params:?}");
        assert_eq!(response.json()["error"], expected, "{params:?}");
        assert_eq!(response.headers["cache-control"], "no-store");
    }
}

#[tokio::test]
async fn unknown_client_looks_like_a_wrong_secret() {
    let env = TestEnv::new();
    let (code, _) = env.authorize_code("openid", "").await;

    let response = env
        .post(
            "/login/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", REDIRECT_URI),
                ("client_id", "someone_else"),
                ("client_secret", CLIENT_SECRET),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "unauthorized_client");
    assert_eq!(response.json()["error_description"], "invalid client_id or client_secret");
}

#[tokio::test]
async fn json_body_is_accepted() {
    let env = TestEnv::new();
    let (code, _) = env.authorize_code("openid", "").await;

    let body = json!({
        "grant_type": "authorization_code",
        "code": code,
        "redirect_uri": REDIRECT_URI,
        "client_id": CLIENT_ID,
        "client_secret": CLIENT_SECRET,
    });
    let request = Request::post("/login/token")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = env.send(request).await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
}

#[tokio::test]
async fn disabled_client_auth_needs_no_secret() {
    let env = TestEnv::with_config("disable_client_auth: true\n");
    let (code, _) = env.authorize_code("openid", "").await;

    let response = env
        .post(
            "/login/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", REDIRECT_URI),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());

    let response = env
        .post(
            "/login/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("redirect_uri", REDIRECT_URI),
                ("client_secret", CLIENT_SECRET),
            ],
            None,
        )
        .await;
    assert_eq!(response.json()["error"], "invalid_request");
}
