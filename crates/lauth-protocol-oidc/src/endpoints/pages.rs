//! HTML pages.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

/// Login form.
#[derive(Template)]
#[template(path = "login.html")]
pub(crate) struct LoginPage<'a> {
    pub issuer: &'a str,
    pub client_name: &'a str,
    pub action: &'a str,
    /// Request parameters carried through the form.
    pub hidden: Vec<(&'static str, String)>,
    /// Pre-filled login name.
    pub username: &'a str,
    pub error: Option<&'a str>,
    /// Login session token bound to the caller.
    pub session: String,
}

/// Shown after a logout without a redirect.
#[derive(Template)]
#[template(path = "logout.html")]
pub(crate) struct LogoutPage<'a> {
    pub issuer: &'a str,
}

/// Error page for errors that cannot be sent back to the client.
#[derive(Template)]
#[template(path = "error.html")]
pub(crate) struct ErrorPage<'a> {
    pub status: u16,
    pub error: &'a str,
    pub description: Option<&'a str>,
}

/// Renders `page` with `status`.
pub(crate) fn render<T: Template>(status: StatusCode, page: &T) -> Response {
    match page.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "template render error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}
