//! Request extractors.
//!
//! [`Bound`] reads parameters the way every endpoint accepts them: the query
//! string for `GET`, otherwise the body as JSON, XML or a URL-encoded form
//! depending on `Content-Type`.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use crate::error::OidcError;

use super::dispatch::HtmlError;

/// Parameters bound from the query or the body.
#[derive(Debug, Clone)]
pub struct Bound<T>(pub T);

/// Parameters could not be read. Renders as an HTML error page.
#[derive(Debug)]
pub struct BindError(pub OidcError);

impl IntoResponse for BindError {
    fn into_response(self) -> Response {
        HtmlError(self.0).into_response()
    }
}

fn bind_error(cause: impl Into<crate::error::BoxError>) -> BindError {
    BindError(OidcError::invalid_request("failed to parse request").caused_by(cause))
}

enum BodyFormat {
    Json,
    Xml,
    Form,
}

fn body_format(headers: &HeaderMap) -> BodyFormat {
    let mime = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        "application/json" => BodyFormat::Json,
        "application/xml" | "text/xml" => BodyFormat::Xml,
        _ => BodyFormat::Form,
    }
}

impl<T, S> FromRequest<S> for Bound<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = BindError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if matches!(*req.method(), Method::GET | Method::HEAD) {
            let query = req.uri().query().unwrap_or_default();
            return serde_urlencoded::from_str(query).map(Bound).map_err(bind_error);
        }

        let format = body_format(req.headers());
        let body = Bytes::from_request(req, state).await.map_err(bind_error)?;
        let value = match format {
            BodyFormat::Json => serde_json::from_slice(&body).map_err(bind_error)?,
            BodyFormat::Xml => {
                let text = std::str::from_utf8(&body).map_err(bind_error)?;
                quick_xml::de::from_str(text).map_err(bind_error)?
            }
            BodyFormat::Form => serde_urlencoded::from_bytes(&body).map_err(bind_error)?,
        };
        Ok(Bound(value))
    }
}

/// Caller address: the first `X-Forwarded-For` hop, else the TCP peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return Ok(Self(ip.to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string());
        Ok(Self(peer))
    }
}

/// Token from an `Authorization: Bearer` header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
