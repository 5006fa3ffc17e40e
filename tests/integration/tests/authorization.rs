//! Authorization endpoint validation and login handling.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use lauth_integration_tests::{TestEnv, CLIENT_ID, REDIRECT_URI};
use lauth_protocol_oidc::token::now;
use lauth_protocol_oidc::SSO_COOKIE_NAME;

const CODE_REQUEST: [(&str, &str); 3] = [
    ("response_type", "code"),
    ("client_id", CLIENT_ID),
    ("redirect_uri", REDIRECT_URI),
];

fn without(name: &str) -> Vec<(&'static str, &'static str)> {
    CODE_REQUEST.iter().copied().filter(|(k, _)| *k != name).collect()
}

#[tokio::test]
async fn missing_parameters_have_exact_messages() {
    let env = TestEnv::new();

    let response = env.get("/login", &without("client_id"), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("client_id is required"), "{}", response.text());

    let response = env.get("/login", &without("redirect_uri"), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("redirect_uri is required"), "{}", response.text());

    let response = env.get("/login", &without("response_type"), None).await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.query_param("error_description").as_deref(),
        Some("response_type is required")
    );

    let mut params = without("response_type");
    params.push(("response_type", "code foo"));
    let response = env.get("/login", &params, None).await;
    assert_eq!(
        response.fragment_param("error_description").as_deref(),
        Some("response_type \"foo\" is not supported")
    );
}

#[tokio::test]
async fn untrusted_redirects_are_not_followed() {
    let env = TestEnv::new();

    let response = env
        .get(
            "/login",
            &[
                ("response_type", "code"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", "http://evil.example.com/callback"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("unauthorized_client"));

    let response = env
        .get(
            "/login",
            &[
                ("response_type", "code"),
                ("client_id", "nobody"),
                ("redirect_uri", REDIRECT_URI),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("invalid_client"));
}

#[tokio::test]
async fn disabled_client_auth_and_unregistered_clients() {
    let env = TestEnv::with_config("disable_client_auth: true\n");

    let response = env
        .get(
            "/login",
            &[
                ("response_type", "code"),
                ("client_id", "another_client"),
                ("redirect_uri", REDIRECT_URI),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("invalid_client"));

    let response = env
        .get(
            "/login",
            &[
                ("response_type", "code"),
                ("client_id", "another_client"),
                ("redirect_uri", "http://another-client.example.com/callback"),
            ],
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text());
    assert!(response.hidden_field("session").is_some());
}

#[tokio::test]
async fn wrong_password_renders_the_form_again() {
    let env = TestEnv::new();
    let session = env.login_session(&CODE_REQUEST).await;

    let mut form = CODE_REQUEST.to_vec();
    form.extend([
        ("username", "macrat"),
        ("password", "wrong"),
        ("session", session.as_str()),
    ]);
    let response = env.post("/login", &form, None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(response.text().contains("invalid username or password"));
    assert!(response.hidden_field("session").is_some());
    assert!(response.set_cookie(SSO_COOKIE_NAME).is_none());
}

#[tokio::test]
async fn login_session_is_bound_to_the_client() {
    let env = TestEnv::new();

    let mut form = CODE_REQUEST.to_vec();
    form.extend([("username", "macrat"), ("password", "foobar")]);
    let response = env.post("/login", &form, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("invalid session"));

    let foreign = env
        .tokens()
        .create_login_token("198.51.100.7", CLIENT_ID)
        .unwrap();
    form.push(("session", foreign.as_str()));
    let response = env.post("/login", &form, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.text().contains("invalid session"));
}

#[tokio::test]
async fn login_hint_prefills_username() {
    let env = TestEnv::new();
    let mut params = CODE_REQUEST.to_vec();
    params.push(("login_hint", "macrat"));

    let response = env.get("/login", &params, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text().contains(r#"value="macrat""#));
}

#[tokio::test]
async fn max_age_limits_sso_reuse() {
    let env = TestEnv::new();
    let authenticated = now() - 5 * 60;
    let token = env
        .tokens()
        .create_sso_token("macrat", vec![CLIENT_ID.to_string()], authenticated, now() + 3600)
        .unwrap();
    let cookie = format!("{SSO_COOKIE_NAME}={token}");

    let mut params = CODE_REQUEST.to_vec();
    params.push(("max_age", "240"));
    let response = env.get("/login", &params, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK, "login form expected");
    assert!(response.hidden_field("session").is_some());

    let mut params = CODE_REQUEST.to_vec();
    params.push(("max_age", "360"));
    let response = env.get("/login", &params, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());
    let code = env
        .tokens()
        .parse_code(&response.query_param("code").unwrap())
        .unwrap();
    assert_eq!(code.auth_time, authenticated);
}

#[tokio::test]
async fn prompt_login_ignores_sso() {
    let env = TestEnv::new();
    let token = env
        .tokens()
        .create_sso_token("macrat", Vec::new(), now(), now() + 3600)
        .unwrap();
    let cookie = format!("{SSO_COOKIE_NAME}={token}");

    let mut params = CODE_REQUEST.to_vec();
    params.push(("prompt", "login"));
    let response = env.get("/login", &params, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::OK);

    let mut params = CODE_REQUEST.to_vec();
    params.push(("prompt", "none"));
    let response = env.get("/login", &params, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert!(response.query_param("code").is_some());
}

#[tokio::test]
async fn submitted_form_uses_sso_before_password() {
    let env = TestEnv::new();
    let authenticated = now() - 60;
    let token = env
        .tokens()
        .create_sso_token("macrat", vec![CLIENT_ID.to_string()], authenticated, now() + 3600)
        .unwrap();
    let cookie = format!("{SSO_COOKIE_NAME}={token}");
    let session = env.login_session(&CODE_REQUEST).await;

    let mut form = CODE_REQUEST.to_vec();
    form.extend([
        ("username", "macrat"),
        ("password", "WRONG"),
        ("session", session.as_str()),
    ]);
    let response = env.post("/login", &form, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());
    let code = env
        .tokens()
        .parse_code(&response.query_param("code").unwrap())
        .unwrap();
    assert_eq!(code.standard.sub, "macrat");
    assert_eq!(code.auth_time, authenticated);

    form.push(("prompt", "login"));
    let response = env.post("/login", &form, Some(&cookie)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}
