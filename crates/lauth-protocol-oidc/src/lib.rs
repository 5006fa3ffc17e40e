//! # lauth-protocol-oidc
//!
//! `OpenID` Connect provider protocol for lauth.
//!
//! Every artifact this provider hands out is a stateless RS256 JWT: codes,
//! access and ID tokens, the SSO cookie and the login form session. The
//! directory is consulted only to verify passwords and read user attributes.
//!
//! ## Modules
//!
//! - [`claims`] - Claim records for every token kind, discriminated by `typ`
//! - [`discovery`] - `OpenID` Provider Metadata for the `.well-known` endpoint
//! - [`endpoints`] - Axum handlers, router and HTML pages
//! - [`error`] - Error reasons, the error record and token errors
//! - [`jwks`] - JSON Web Key Set types
//! - [`mapper`] - Directory attributes to userinfo claims
//! - [`request`] - Request parameters and the authorization request validator
//! - [`token`] - Token manager for creating and validating tokens
//! - [`types`] - Grant types, response types, response modes and prompts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod discovery;
pub mod endpoints;
pub mod error;
pub mod jwks;
pub mod mapper;
pub mod request;
pub mod token;
pub mod types;

pub use claims::{
    AccessTokenClaims, Audience, Claims, CodeClaims, IdTokenClaims, LoginTokenClaims,
    RefreshTokenClaims, RequestObjectClaims, SsoTokenClaims, StandardClaims, TokenKind,
};
pub use discovery::ProviderMetadata;
pub use endpoints::{oidc_router, LoginDelay, OidcState, Provider, TokenResponse, SSO_COOKIE_NAME};
pub use error::{
    ErrorReason, ErrorResponse, OidcError, OidcResult, TokenError, TokenResult,
};
pub use jwks::{JsonWebKey, JsonWebKeySet};
pub use mapper::map_claims;
pub use request::{
    AuthorizationParams, AuthorizationRequest, LogoutParams, TokenParams, UserinfoParams,
};
pub use token::{IdTokenRequest, TokenManager};
pub use types::{GrantType, Prompt, ResponseMode, ResponseType};
