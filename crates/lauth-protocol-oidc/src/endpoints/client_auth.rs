//! Client authentication at the token endpoint.
//!
//! Supports `client_secret_basic` (HTTP Basic with URL-encoded id and
//! secret) and `client_secret_post` (form fields). When client
//! authentication is disabled, the secret is optional.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use lauth_core::Config;
use lauth_crypto::verify_secret;

use crate::error::{ErrorReason, OidcError, OidcResult};

/// Client credentials as presented by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Client identifier.
    pub client_id: Option<String>,
    /// Plain client secret.
    pub client_secret: Option<String>,
}

fn decode_basic(encoded: &str) -> OidcResult<(String, String)> {
    let invalid = || OidcError::invalid_request("invalid basic auth encoding");
    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| invalid())?;
    let credentials = String::from_utf8(decoded).map_err(|_| invalid())?;
    let (id, secret) = credentials
        .split_once(':')
        .ok_or_else(|| OidcError::invalid_request("invalid basic auth format"))?;
    let id = urlencoding::decode(id).map_err(|_| invalid())?.into_owned();
    let secret = urlencoding::decode(secret).map_err(|_| invalid())?.into_owned();
    Ok((id, secret))
}

/// Merges Basic credentials from `auth_header` with the form fields.
///
/// # Errors
///
/// Returns `invalid_request` if the header is malformed or names a different
/// client than the form.
pub fn extract_credentials(
    auth_header: Option<&str>,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> OidcResult<ClientCredentials> {
    let form_client_id = form_client_id.filter(|v| !v.is_empty());
    let form_client_secret = form_client_secret.filter(|v| !v.is_empty());

    let basic = auth_header.and_then(|h| {
        let (scheme, rest) = h.split_once(' ')?;
        scheme.eq_ignore_ascii_case("basic").then_some(rest)
    });

    if let Some(encoded) = basic {
        let (id, secret) = decode_basic(encoded)?;
        if form_client_id.is_some_and(|form| form != id) {
            return Err(OidcError::invalid_request(
                "client_id is mismatch between basic auth and form",
            ));
        }
        return Ok(ClientCredentials {
            client_id: Some(id),
            client_secret: Some(secret).filter(|s| !s.is_empty()),
        });
    }

    Ok(ClientCredentials {
        client_id: form_client_id.map(str::to_string),
        client_secret: form_client_secret.map(str::to_string),
    })
}

impl ClientCredentials {
    /// Authenticates the client against `config`.
    ///
    /// # Errors
    ///
    /// With client authentication enabled: `invalid_request` when either
    /// value is missing and `unauthorized_client` for an unknown client or a
    /// wrong secret. With it disabled, a secret
    /// without an id is `invalid_request`.
    pub fn authenticate(&self, config: &Config) -> OidcResult<()> {
        if config.disable_client_auth {
            if self.client_id.is_none() && self.client_secret.is_some() {
                return Err(OidcError::invalid_request(
                    "client_secret is set but client_id is not set",
                ));
            }
            return Ok(());
        }

        let (Some(client_id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            return Err(OidcError::invalid_request(
                "client_id and client_secret is required",
            ));
        };
        let verified = config
            .client
            .get(client_id)
            .is_some_and(|client| verify_secret(secret, &client.secret));
        if !verified {
            return Err(OidcError::with_description(
                ErrorReason::UnauthorizedClient,
                "invalid client_id or client_secret",
            ));
        }
        Ok(())
    }
}
