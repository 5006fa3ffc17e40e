//! Router configuration.
//!
//! Combines the OIDC endpoints with health and metrics routes, and applies
//! the headers every response carries.

use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_SECURITY_POLICY, WWW_AUTHENTICATE, X_FRAME_OPTIONS};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use lauth_core::MetricsConfig;
use lauth_protocol_oidc::{oidc_router, OidcState};

/// Creates the main application router.
pub fn create_router(state: OidcState, metrics: PrometheusHandle) -> Router {
    let metrics_config = state.provider.config.metrics.clone();
    let metrics_path = metrics_config.path.clone();

    let oidc = oidc_router(state);

    let health = Router::new().route("/healthz", get(health_check));

    let exporter = Router::new()
        .route(&metrics_path, get(render_metrics))
        .with_state(MetricsState {
            handle: metrics,
            config: metrics_config,
        });

    Router::new()
        .merge(health)
        .merge(exporter)
        .merge(oidc)
        .layer(SetResponseHeaderLayer::overriding(
            X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("frame-ancestors 'none'"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Clone)]
struct MetricsState {
    handle: PrometheusHandle,
    config: MetricsConfig,
}

impl MetricsState {
    /// Basic auth is enforced only when both username and password are set.
    fn authorized(&self, headers: &HeaderMap) -> bool {
        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return true;
        };

        let Some(encoded) = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Basic "))
        else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        decoded
            .split_once(':')
            .is_some_and(|(u, p)| u == username && p == password)
    }
}

async fn render_metrics(State(state): State<MetricsState>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            [(WWW_AUTHENTICATE, r#"Basic realm="metrics""#)],
            "Unauthorized",
        )
            .into_response();
    }
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        state.handle.render(),
    )
        .into_response()
}
