//! Test harness for end-to-end tests.
//!
//! [`TestEnv`] builds the full application router around an in-memory
//! directory and drives it in-process with `tower::ServiceExt::oneshot`.

use std::sync::{Arc, OnceLock};

use axum::body::{to_bytes, Body, Bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower::ServiceExt;
use url::Url;

use lauth_core::Config;
use lauth_crypto::RsaKey;
use lauth_ldap::{MemoryDirectory, MemoryUser};
use lauth_protocol_oidc::{LoginDelay, Provider, TokenManager, SSO_COOKIE_NAME};
use lauth_server::Server;

/// Issuer used by every environment.
pub const ISSUER: &str = "http://localhost:8000";
/// Registered client.
pub const CLIENT_ID: &str = "some_client_id";
/// Plain secret of [`CLIENT_ID`].
pub const CLIENT_SECRET: &str = "secret for some_client_id";
/// Registered redirect URI of [`CLIENT_ID`].
pub const REDIRECT_URI: &str = "http://some-client.example.com/callback";
/// Registered CORS origin of [`CLIENT_ID`].
pub const ORIGIN: &str = "http://some-client.example.com";
/// Address every request claims to come from.
pub const CLIENT_IP: &str = "192.0.2.10";

/// Generating RSA keys is slow, so every environment shares one.
fn shared_key() -> RsaKey {
    static KEY: OnceLock<RsaKey> = OnceLock::new();
    KEY.get_or_init(|| RsaKey::generate().expect("failed to generate key"))
        .clone()
}

fn directory() -> MemoryDirectory {
    MemoryDirectory::new().with_user(
        "macrat",
        MemoryUser::new("foobar")
            .with_attribute("displayName", ["SHIDA Yuuma"])
            .with_attribute("givenName", ["yuuma"])
            .with_attribute("sn", ["shida"])
            .with_attribute("mail", ["m@crat.jp"]),
    )
}

/// Test environment holding a ready router.
pub struct TestEnv {
    server: Server,
    router: Router,
}

impl TestEnv {
    /// Environment with default settings.
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Environment with `extra_yaml` appended to the base configuration.
    pub fn with_config(extra_yaml: &str) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("lauth_server=debug,lauth_protocol_oidc=debug")
            .with_test_writer()
            .try_init();

        let hash = bcrypt::hash(lauth_crypto::sha512(CLIENT_SECRET.as_bytes()), 4)
            .expect("failed to hash secret");
        let yaml = format!(
            r#"
issuer: {ISSUER}
ttl:
  token: 1h
client:
  {CLIENT_ID}:
    name: Some Client
    secret: "{hash}"
    redirect_uri:
      - {REDIRECT_URI}
    cors_origin:
      - {ORIGIN}
{extra_yaml}"#
        );
        let config = Config::from_yaml(&yaml).expect("invalid test configuration");
        let tokens = TokenManager::new(config.issuer.clone(), config.ttl, shared_key())
            .expect("failed to build token manager");
        let provider = Provider::new(config, tokens, Arc::new(directory()))
            .expect("failed to build provider")
            .with_login_delay(LoginDelay::disabled());

        let metrics = PrometheusBuilder::new().build_recorder().handle();
        let server = Server::from_parts(provider, metrics);
        let router = server.router();
        Self { server, router }
    }

    /// The provider behind the router.
    pub fn provider(&self) -> &Provider {
        self.server.provider()
    }

    /// The token manager, for minting and checking tokens directly.
    pub fn tokens(&self) -> &TokenManager {
        &self.provider().tokens
    }

    /// Sends a request through the router.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// GET `path` with `params` in the query.
    pub async fn get(&self, path: &str, params: &[(&str, &str)], cookie: Option<&str>) -> TestResponse {
        let uri = if params.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{}", encode(params))
        };
        self.send(request(Method::GET, &uri, cookie).body(Body::empty()).expect("bad request"))
            .await
    }

    /// POST `params` as a form to `path`.
    pub async fn post(&self, path: &str, params: &[(&str, &str)], cookie: Option<&str>) -> TestResponse {
        self.send(
            request(Method::POST, path, cookie)
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(encode(params)))
                .expect("bad request"),
        )
        .await
    }

    /// Fetches the login form for `params` and returns its `session` token.
    pub async fn login_session(&self, params: &[(&str, &str)]) -> String {
        let page = self.get("/login", params, None).await;
        assert_eq!(page.status, StatusCode::OK, "{}", page.text());
        page.hidden_field("session")
            .expect("login form has no session field")
    }

    /// Submits the login form as `macrat` for the authorization request `params`.
    pub async fn login(&self, params: &[(&str, &str)]) -> TestResponse {
        let session = self.login_session(params).await;
        let mut form = params.to_vec();
        form.extend([
            ("username", "macrat"),
            ("password", "foobar"),
            ("session", session.as_str()),
        ]);
        self.post("/login", &form, None).await
    }

    /// Runs the code flow for `scope` and returns the code.
    pub async fn authorize_code(&self, scope: &str, nonce: &str) -> (String, TestResponse) {
        let response = self
            .login(&[
                ("response_type", "code"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
                ("scope", scope),
                ("nonce", nonce),
            ])
            .await;
        assert_eq!(response.status, StatusCode::FOUND, "{}", response.text());
        let code = response
            .query_param("code")
            .expect("redirect has no code");
        (code, response)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

fn request(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP);
    match cookie {
        Some(cookie) => builder.header(COOKIE, cookie),
        None => builder,
    }
}

fn encode(params: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(params).expect("params are strings")
}

/// A fully buffered response.
#[derive(Debug)]
pub struct TestResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl TestResponse {
    /// Body as text, with the HTML entities askama produces decoded.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body)
            .replace("&#34;", "\"")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&")
    }

    /// Body as JSON.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body is not JSON")
    }

    /// The `Location` header as a URL.
    pub fn location(&self) -> Url {
        let raw = self.headers[LOCATION].to_str().expect("location is not text");
        Url::parse(raw).expect("location is not a URL")
    }

    /// A parameter from the redirect query.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.location()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// A parameter from the redirect fragment.
    pub fn fragment_param(&self, name: &str) -> Option<String> {
        let location = self.location();
        url::form_urlencoded::parse(location.fragment()?.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Value of a hidden form field on a rendered page.
    pub fn hidden_field(&self, name: &str) -> Option<String> {
        let text = self.text();
        let marker = format!(r#"name="{name}" value=""#);
        let start = text.find(&marker)? + marker.len();
        let end = text[start..].find('"')? + start;
        Some(text[start..end].to_string())
    }

    /// The raw `Set-Cookie` header for `name`.
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{name}=")))
            .map(str::to_string)
    }

    /// The SSO cookie as a `Cookie` request header value.
    pub fn sso_cookie(&self) -> Option<String> {
        let raw = self.set_cookie(SSO_COOKIE_NAME)?;
        let pair = raw.split(';').next()?.trim().to_string();
        (pair.len() > SSO_COOKIE_NAME.len() + 1).then_some(pair)
    }
}
