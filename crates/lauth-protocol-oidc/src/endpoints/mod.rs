//! OIDC endpoint handlers for Axum.
//!
//! This module provides HTTP handlers for every provider endpoint:
//! - Authorization (`/login`), GET and POST, with the HTML login form
//! - Token (`/login/token`), `authorization_code` grant only
//! - `UserInfo` (`/login/userinfo`), with CORS for registered origins
//! - JWKS (`/login/jwks`)
//! - RP-initiated logout (`/logout`)
//! - Discovery (`/.well-known/openid-configuration`)
//!
//! Paths are taken from configuration; the defaults are shown.
//!
//! ## Router Setup
//!
//! ```rust,ignore
//! use lauth_protocol_oidc::endpoints::{oidc_router, OidcState, Provider};
//!
//! let provider = Provider::new(config, tokens, directory)?;
//! let app = oidc_router(OidcState::new(provider));
//! ```

mod authorization;
mod client_auth;
mod discovery;
mod dispatch;
mod extract;
mod issue;
mod logout;
mod pages;
mod router;
mod sso;
mod state;
mod token;
mod userinfo;

pub use client_auth::{extract_credentials, ClientCredentials};
pub use dispatch::{HtmlError, JsonError};
pub use extract::{bearer_token, BindError, Bound, ClientIp};
pub use router::oidc_router;
pub use sso::SSO_COOKIE_NAME;
pub use state::{LoginDelay, OidcState, Provider};
pub use token::TokenResponse;
