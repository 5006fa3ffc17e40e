//! OIDC request types and the authorization request validator.
//!
//! Parameters are bound as optional strings first (from the query, a form,
//! JSON or XML) and then validated into an [`AuthorizationRequest`]. The first
//! failed check decides the error. Once `redirect_uri` is known to be an
//! absolute URL, every later failure carries it so the dispatcher can send the
//! user agent back to the client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use lauth_core::{Config, StringSet};

use crate::claims::RequestObjectClaims;
use crate::error::{ErrorReason, OidcError, OidcResult};
use crate::token::TokenManager;
use crate::types::{Prompt, ResponseType};

/// Accepts a string or a number and keeps it as a string.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Integer(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Raw authorization endpoint parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationParams {
    /// `response_type`
    pub response_type: Option<String>,
    /// `client_id`
    pub client_id: Option<String>,
    /// `redirect_uri`
    pub redirect_uri: Option<String>,
    /// `scope`
    pub scope: Option<String>,
    /// `state`
    pub state: Option<String>,
    /// `nonce`
    pub nonce: Option<String>,
    /// `prompt`
    pub prompt: Option<String>,
    /// `max_age`, kept as text until validation.
    #[serde(deserialize_with = "string_or_number")]
    pub max_age: Option<String>,
    /// `login_hint`
    pub login_hint: Option<String>,
    /// Signed request object.
    pub request: Option<String>,
    /// Request object by reference. Never supported.
    pub request_uri: Option<String>,
    /// Submitted login name.
    pub username: Option<String>,
    /// Submitted password.
    pub password: Option<String>,
    /// Login form token.
    pub session: Option<String>,
}

impl AuthorizationParams {
    /// Whether credentials were sent.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() || self.password.is_some()
    }

    fn merge(mut self, object: RequestObjectClaims) -> Self {
        fn replace(target: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *target = value;
            }
        }
        replace(&mut self.response_type, object.response_type);
        replace(&mut self.client_id, object.client_id);
        replace(&mut self.redirect_uri, object.redirect_uri);
        replace(&mut self.scope, object.scope);
        replace(&mut self.state, object.state);
        replace(&mut self.nonce, object.nonce);
        replace(&mut self.prompt, object.prompt);
        replace(&mut self.login_hint, object.login_hint);
        replace(
            &mut self.max_age,
            object.max_age.map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            }),
        );
        self.request = None;
        self
    }

    /// Validates the parameters against the configuration.
    ///
    /// A `request` object, when allowed for the client, is verified and its
    /// claims replace the plain parameters before the remaining checks.
    ///
    /// # Errors
    ///
    /// Returns the first failed check. Failures are redirectable once the
    /// `redirect_uri` is known to belong to the client.
    pub fn validate(self, config: &Config, tokens: &TokenManager) -> OidcResult<AuthorizationRequest> {
        let redirect_raw = non_empty(self.redirect_uri.as_ref())
            .ok_or_else(|| OidcError::invalid_request("redirect_uri is required"))?;
        let redirect_url = Url::parse(&redirect_raw)
            .map_err(|_| OidcError::invalid_request("redirect_uri is not absolute URL"))?;

        let response_type = StringSet::parse(self.response_type.as_deref().unwrap_or_default());
        let state = non_empty(self.state.as_ref());
        let fail = |reason: ErrorReason, description: String| {
            OidcError::with_description(reason, description).redirect_to(
                &redirect_url,
                &response_type,
                state.as_deref(),
            )
        };

        // Until the client is known to own the redirect target, errors render
        // as a page instead.
        let trusted = non_empty(self.client_id.as_ref())
            .and_then(|id| config.client.get(&id))
            .is_some_and(|c| c.redirect_uri.matches(&redirect_raw));
        let reject = |reason: ErrorReason, description: String| {
            if trusted {
                fail(reason, description)
            } else {
                OidcError::with_description(reason, description)
            }
        };

        if self.request_uri.as_deref().is_some_and(|v| !v.is_empty()) {
            return Err(reject(
                ErrorReason::RequestUriNotSupported,
                "request_uri is not supported".to_string(),
            ));
        }

        if let Some(object) = non_empty(self.request.as_ref()) {
            let client_id = non_empty(self.client_id.as_ref()).unwrap_or_default();
            let Some(key) = config.client.get(&client_id).and_then(|c| c.request_key.as_deref()) else {
                return Err(reject(
                    ErrorReason::RequestNotSupported,
                    "request object is not supported for this client".to_string(),
                ));
            };
            let claims = tokens
                .parse_request_object(&object, &client_id, key)
                .map_err(|e| reject(ErrorReason::InvalidRequestObject, e.to_string()))?;
            tracing::debug!(client_id = %client_id, "applied signed request object");
            return self.merge(claims).validate(config, tokens);
        }

        let client_id = non_empty(self.client_id.as_ref())
            .ok_or_else(|| reject(ErrorReason::InvalidRequest, "client_id is required".to_string()))?;

        match config.client.get(&client_id) {
            Some(client) if !client.redirect_uri.matches(&redirect_raw) => {
                return Err(reject(
                    ErrorReason::UnauthorizedClient,
                    "redirect_uri is not registered".to_string(),
                ));
            }
            Some(_) => {}
            None if config.disable_client_auth => {
                if config.client.any_redirect_matches(&redirect_raw) {
                    return Err(reject(
                        ErrorReason::InvalidClient,
                        "client is not registered".to_string(),
                    ));
                }
            }
            None => {
                return Err(reject(
                    ErrorReason::InvalidClient,
                    "client is not registered".to_string(),
                ));
            }
        }

        if response_type.is_empty() {
            return Err(fail(
                ErrorReason::UnsupportedResponseType,
                "response_type is required".to_string(),
            ));
        }
        if let Err(e) = response_type.validate(ResponseType::SUPPORTED) {
            return Err(fail(ErrorReason::UnsupportedResponseType, format!("response_type {e}")));
        }
        if !config.allow_implicit_flow && !response_type.is_exactly(&[ResponseType::Code.as_str()]) {
            return Err(fail(
                ErrorReason::UnsupportedResponseType,
                "implicit/hybrid flow is disallowed in this server".to_string(),
            ));
        }

        let prompt = StringSet::parse(self.prompt.as_deref().unwrap_or_default());
        if let Err(e) = prompt.validate(Prompt::SUPPORTED) {
            return Err(fail(ErrorReason::InvalidRequest, format!("prompt {e}")));
        }
        if prompt.contains(Prompt::None.as_str()) && prompt.len() > 1 {
            return Err(fail(
                ErrorReason::InvalidRequest,
                "prompt=none can not be combined with other values".to_string(),
            ));
        }

        let max_age = match non_empty(self.max_age.as_ref()) {
            None => None,
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(v) if v >= 0 => Some(v),
                _ => {
                    return Err(fail(
                        ErrorReason::InvalidRequest,
                        "max_age must be a non-negative integer".to_string(),
                    ));
                }
            },
        };

        Ok(AuthorizationRequest {
            response_type,
            client_id,
            redirect_uri: redirect_raw,
            redirect_url,
            scope: StringSet::parse(self.scope.as_deref().unwrap_or_default()),
            state,
            nonce: non_empty(self.nonce.as_ref()),
            prompt,
            max_age,
            login_hint: non_empty(self.login_hint.as_ref()),
            username: self.username,
            password: self.password,
            session: non_empty(self.session.as_ref()),
        })
    }
}

/// A validated authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Requested response types.
    pub response_type: StringSet,
    /// Requesting client.
    pub client_id: String,
    /// Redirect URI exactly as sent.
    pub redirect_uri: String,
    /// Redirect URI parsed.
    pub redirect_url: Url,
    /// Requested scope.
    pub scope: StringSet,
    /// Opaque client state.
    pub state: Option<String>,
    /// Nonce for the ID token.
    pub nonce: Option<String>,
    /// Prompt values.
    pub prompt: StringSet,
    /// Maximum authentication age in seconds.
    pub max_age: Option<i64>,
    /// Suggested login name.
    pub login_hint: Option<String>,
    /// Submitted login name.
    pub username: Option<String>,
    /// Submitted password.
    pub password: Option<String>,
    /// Login form token.
    pub session: Option<String>,
}

impl AuthorizationRequest {
    /// An error that redirects back to the client.
    #[must_use]
    pub fn error(&self, reason: ErrorReason, description: impl Into<String>) -> OidcError {
        OidcError::with_description(reason, description).redirect_to(
            &self.redirect_url,
            &self.response_type,
            self.state.as_deref(),
        )
    }

    /// Whether `prompt` contains `value`.
    #[must_use]
    pub fn prompts(&self, value: Prompt) -> bool {
        self.prompt.contains(value.as_str())
    }

    /// Whether `response_type` contains `value`.
    #[must_use]
    pub fn wants(&self, value: ResponseType) -> bool {
        self.response_type.contains(value.as_str())
    }

    /// Whether parameters are returned in the query.
    #[must_use]
    pub fn uses_query(&self) -> bool {
        self.response_type.is_exactly(&[ResponseType::Code.as_str()])
    }

    /// Whether an SSO session authenticated at `auth_time` can be reused at
    /// `now`.
    #[must_use]
    pub fn allows_sso(&self, auth_time: i64, now: i64) -> bool {
        let interactive = [Prompt::Login, Prompt::Consent, Prompt::SelectAccount]
            .into_iter()
            .any(|p| self.prompts(p));
        !interactive && self.max_age.map_or(true, |max| now - auth_time <= max)
    }

    /// Request parameters to carry through the login form.
    #[must_use]
    pub fn hidden_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("response_type", self.response_type.joined()),
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
        ];
        if !self.scope.is_empty() {
            fields.push(("scope", self.scope.joined()));
        }
        if let Some(state) = &self.state {
            fields.push(("state", state.clone()));
        }
        if let Some(nonce) = &self.nonce {
            fields.push(("nonce", nonce.clone()));
        }
        if !self.prompt.is_empty() {
            fields.push(("prompt", self.prompt.joined()));
        }
        if let Some(max_age) = self.max_age {
            fields.push(("max_age", max_age.to_string()));
        }
        if let Some(hint) = &self.login_hint {
            fields.push(("login_hint", hint.clone()));
        }
        fields
    }
}

/// Token endpoint parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenParams {
    /// `grant_type`
    pub grant_type: Option<String>,
    /// `code`
    pub code: Option<String>,
    /// `redirect_uri`
    pub redirect_uri: Option<String>,
    /// `client_id`
    pub client_id: Option<String>,
    /// `client_secret`
    pub client_secret: Option<String>,
}

/// Userinfo endpoint form parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserinfoParams {
    /// Access token sent in the body.
    pub access_token: Option<String>,
}

/// Logout endpoint parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoutParams {
    /// ID token previously issued to the client.
    pub id_token_hint: Option<String>,
    /// Where to send the user agent afterwards.
    pub post_logout_redirect_uri: Option<String>,
    /// Opaque client state.
    pub state: Option<String>,
}
