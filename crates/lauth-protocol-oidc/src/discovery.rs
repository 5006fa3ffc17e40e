//! `OpenID` Connect Discovery 1.0 implementation.
//!
//! Implements the `OpenID` Provider Metadata as defined in:
//! - [OpenID Connect Discovery 1.0](https://openid.net/specs/openid-connect-discovery-1_0.html)
//! - [RFC 8414](https://tools.ietf.org/html/rfc8414) (OAuth 2.0 Authorization Server Metadata)

use serde::{Deserialize, Serialize};
use url::Url;

use lauth_core::Config;

use crate::types::{GrantType, ResponseMode, ResponseType};

/// `OpenID` Provider Metadata.
///
/// Served at `/.well-known/openid-configuration`. The document only depends
/// on configuration, so it is built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier.
    pub issuer: String,

    /// Authorization endpoint URL.
    pub authorization_endpoint: String,

    /// Token endpoint URL.
    pub token_endpoint: String,

    /// `UserInfo` endpoint URL.
    pub userinfo_endpoint: String,

    /// JWKS URL.
    pub jwks_uri: String,

    /// RP-initiated logout endpoint URL.
    pub end_session_endpoint: String,

    /// Configured scopes plus `openid`.
    pub scopes_supported: Vec<String>,

    /// `["code"]`, or every combination when implicit flow is allowed.
    pub response_types_supported: Vec<String>,

    /// Response modes.
    pub response_modes_supported: Vec<String>,

    /// Grant types.
    pub grant_types_supported: Vec<String>,

    /// Subject identifier types.
    pub subject_types_supported: Vec<String>,

    /// ID token signing algorithms.
    pub id_token_signing_alg_values_supported: Vec<String>,

    /// Request object signing algorithms.
    pub request_object_signing_alg_values_supported: Vec<String>,

    /// Client authentication methods at the token endpoint.
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Login page display modes.
    pub display_values_supported: Vec<String>,

    /// Claims any scope can produce.
    pub claims_supported: Vec<String>,

    /// Whether the `claims` parameter is supported.
    pub claims_parameter_supported: bool,

    /// Whether the `request` parameter is supported.
    pub request_parameter_supported: bool,

    /// Whether the `request_uri` parameter is supported.
    pub request_uri_parameter_supported: bool,
}

fn endpoint(issuer: &Url, path: &str) -> String {
    issuer
        .join(path)
        .map_or_else(|_| format!("{}{path}", issuer.as_str().trim_end_matches('/')), String::from)
}

impl ProviderMetadata {
    /// Builds the document for `config`, whose issuer has been parsed as
    /// `issuer`.
    #[must_use]
    pub fn from_config(config: &Config, issuer: &Url) -> Self {
        let response_types = if config.allow_implicit_flow {
            ResponseType::all_combinations()
        } else {
            vec![ResponseType::Code.as_str().to_string()]
        };

        let mut grant_types = vec![GrantType::AuthorizationCode.as_str().to_string()];
        if config.allow_implicit_flow {
            grant_types.push(GrantType::Implicit.as_str().to_string());
        }

        let auth_methods = if config.disable_client_auth {
            vec!["none".to_string()]
        } else {
            vec![
                "client_secret_post".to_string(),
                "client_secret_basic".to_string(),
            ]
        };

        Self {
            issuer: config.issuer.clone(),
            authorization_endpoint: endpoint(issuer, &config.endpoint.authorization),
            token_endpoint: endpoint(issuer, &config.endpoint.token),
            userinfo_endpoint: endpoint(issuer, &config.endpoint.userinfo),
            jwks_uri: endpoint(issuer, &config.endpoint.jwks),
            end_session_endpoint: endpoint(issuer, &config.endpoint.logout),
            scopes_supported: config.scope.scope_names(),
            response_types_supported: response_types,
            response_modes_supported: vec![
                ResponseMode::Query.as_str().to_string(),
                ResponseMode::Fragment.as_str().to_string(),
            ],
            grant_types_supported: grant_types,
            subject_types_supported: vec!["public".to_string()],
            id_token_signing_alg_values_supported: vec!["RS256".to_string()],
            request_object_signing_alg_values_supported: vec!["RS256".to_string()],
            token_endpoint_auth_methods_supported: auth_methods,
            display_values_supported: vec!["page".to_string()],
            claims_supported: config.scope.all_claims(),
            claims_parameter_supported: false,
            request_parameter_supported: config.client.iter().any(|(_, c)| c.request_key.is_some()),
            request_uri_parameter_supported: false,
        }
    }
}
