//! Server configuration.
//!
//! Configuration is layered with figment: built-in defaults, then the YAML
//! file, then `LAUTH_`-prefixed environment variables (nested keys separated
//! by `__`, e.g. `LAUTH_LDAP__PASSWORD`), then caller supplied overrides such
//! as command line flags.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::{Figment, Provider};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::duration::HumanDuration;
use crate::error::{CoreError, CoreResult};
use crate::pattern::PatternSet;
use crate::string_set::StringSet;

/// Paths served regardless of `endpoint.*`.
const RESERVED_PATHS: [&str; 2] = ["/.well-known/openid-configuration", "/healthz"];

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Issuer URL placed in the `iss` claim of every token.
    pub issuer: String,
    /// Address the HTTP server binds to.
    pub listen: SocketAddr,
    /// PEM file holding the RSA signing key. A key is generated when unset.
    pub sign_key: Option<PathBuf>,
    /// Token lifetimes.
    pub ttl: TtlConfig,
    /// Endpoint paths.
    pub endpoint: EndpointConfig,
    /// Scope to claim mappings.
    pub scope: ScopeConfig,
    /// Registered clients.
    pub client: ClientConfig,
    /// Directory connection.
    pub ldap: LdapConfig,
    /// Prometheus endpoint.
    pub metrics: MetricsConfig,
    /// Skip client authentication at the token endpoint.
    pub disable_client_auth: bool,
    /// Allow `token` and `id_token` response types.
    pub allow_implicit_flow: bool,
    /// Do not set `Domain` on the SSO cookie.
    pub omit_cookie_domain: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8000".to_string(),
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            sign_key: None,
            ttl: TtlConfig::default(),
            endpoint: EndpointConfig::default(),
            scope: ScopeConfig::default(),
            client: ClientConfig::default(),
            ldap: LdapConfig::default(),
            metrics: MetricsConfig::default(),
            disable_client_auth: false,
            allow_implicit_flow: false,
            omit_cookie_domain: false,
        }
    }
}

impl Config {
    /// Loads configuration from defaults, an optional YAML file, the
    /// environment and `overrides`, then validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, a value fails to parse, or
    /// validation fails.
    pub fn load<P: Provider>(path: Option<&Path>, overrides: P) -> CoreResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(p) = path {
            if !p.exists() {
                return Err(CoreError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        let config: Self = figment
            .merge(Env::prefixed("LAUTH_").split("__"))
            .merge(overrides)
            .extract()?;

        config.validate()?;
        tracing::debug!(issuer = %config.issuer, clients = config.client.len(), "configuration loaded");
        Ok(config)
    }

    /// Parses a YAML document on top of the defaults, without consulting the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or validation fails.
    pub fn from_yaml(yaml: &str) -> CoreResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::string(yaml))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed issuer URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer is not an absolute URL.
    pub fn issuer_url(&self) -> CoreResult<Url> {
        Url::parse(&self.issuer)
            .map_err(|e| CoreError::Invalid(format!("issuer {:?}: {e}", self.issuer)))
    }

    /// Checks cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> CoreResult<()> {
        let issuer = self.issuer_url()?;
        if !matches!(issuer.scheme(), "http" | "https") || issuer.host_str().is_none() {
            return Err(CoreError::Invalid(format!(
                "issuer must be an http or https URL: {}",
                self.issuer
            )));
        }
        if issuer.query().is_some() || issuer.fragment().is_some() {
            return Err(CoreError::Invalid(
                "issuer must not have a query or fragment".to_string(),
            ));
        }

        let mut paths = self.endpoint.paths();
        paths.push(("metrics", self.metrics.path.as_str()));
        for (name, path) in &paths {
            if !path.starts_with('/') {
                return Err(CoreError::Invalid(format!(
                    "endpoint.{name} must start with '/': {path:?}"
                )));
            }
        }
        if let Some((name, path)) = paths.iter().find(|(_, p)| RESERVED_PATHS.contains(p)) {
            return Err(CoreError::Invalid(format!(
                "endpoint.{name} uses the reserved path {path:?}"
            )));
        }
        for (i, (name, path)) in paths.iter().enumerate() {
            if let Some((other, _)) = paths[..i].iter().find(|(_, p)| p == path) {
                return Err(CoreError::Invalid(format!(
                    "endpoint.{name} and endpoint.{other} share the path {path:?}"
                )));
            }
        }

        self.ldap.validate()?;

        if !self.disable_client_auth {
            if let Some((id, _)) = self.client.iter().find(|(_, c)| c.secret.is_empty()) {
                return Err(CoreError::Invalid(format!(
                    "client {id:?} has no secret but client authentication is enabled"
                )));
            }
        }

        Ok(())
    }
}

/// Token lifetimes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    /// Login form session token.
    pub login: HumanDuration,
    /// Authorization code.
    pub code: HumanDuration,
    /// Access and ID tokens.
    pub token: HumanDuration,
    /// Refresh token.
    pub refresh: HumanDuration,
    /// SSO cookie. Zero disables single sign-on.
    pub sso: HumanDuration,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            login: HumanDuration::from_hours(1),
            code: HumanDuration::from_mins(5),
            token: HumanDuration::from_days(1),
            refresh: HumanDuration::from_days(7),
            sso: HumanDuration::from_days(14),
        }
    }
}

/// Endpoint paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Authorization endpoint.
    pub authorization: String,
    /// Token endpoint.
    pub token: String,
    /// Userinfo endpoint.
    pub userinfo: String,
    /// JWKS endpoint.
    pub jwks: String,
    /// RP-initiated logout endpoint.
    pub logout: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            authorization: "/login".to_string(),
            token: "/login/token".to_string(),
            userinfo: "/login/userinfo".to_string(),
            jwks: "/login/jwks".to_string(),
            logout: "/logout".to_string(),
        }
    }
}

impl EndpointConfig {
    fn paths(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("authorization", self.authorization.as_str()),
            ("token", self.token.as_str()),
            ("userinfo", self.userinfo.as_str()),
            ("jwks", self.jwks.as_str()),
            ("logout", self.logout.as_str()),
        ]
    }
}

/// How a directory attribute value is coerced into a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClaimType {
    /// First value as a string.
    #[default]
    #[serde(rename = "string")]
    String,
    /// All values as an array of strings.
    #[serde(rename = "[]string")]
    StringList,
    /// First value as a number.
    #[serde(rename = "number")]
    Number,
    /// All values as an array of numbers.
    #[serde(rename = "[]number")]
    NumberList,
}

/// One claim produced from one directory attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Claim name in tokens and userinfo.
    pub claim: String,
    /// Directory attribute to read.
    pub attribute: String,
    /// Coercion applied to the attribute values.
    #[serde(rename = "type", default)]
    pub kind: ClaimType,
}

impl ClaimConfig {
    fn new(claim: &str, attribute: &str, kind: ClaimType) -> Self {
        Self {
            claim: claim.to_string(),
            attribute: attribute.to_string(),
            kind,
        }
    }
}

/// Scope name to claim list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeConfig(BTreeMap<String, Vec<ClaimConfig>>);

impl Default for ScopeConfig {
    fn default() -> Self {
        let mut scopes = BTreeMap::new();
        scopes.insert(
            "profile".to_string(),
            vec![
                ClaimConfig::new("name", "displayName", ClaimType::String),
                ClaimConfig::new("given_name", "givenName", ClaimType::String),
                ClaimConfig::new("family_name", "sn", ClaimType::String),
            ],
        );
        scopes.insert(
            "email".to_string(),
            vec![ClaimConfig::new("email", "mail", ClaimType::String)],
        );
        scopes.insert(
            "phone".to_string(),
            vec![ClaimConfig::new("phone_number", "telephoneNumber", ClaimType::String)],
        );
        scopes.insert(
            "groups".to_string(),
            vec![ClaimConfig::new("groups", "memberOf", ClaimType::StringList)],
        );
        Self(scopes)
    }
}

impl ScopeConfig {
    /// Builds a scope map from explicit entries.
    #[must_use]
    pub fn new(scopes: BTreeMap<String, Vec<ClaimConfig>>) -> Self {
        Self(scopes)
    }

    /// Configured scope names plus the implicit `openid`, sorted.
    #[must_use]
    pub fn scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.keys().cloned().collect();
        if !names.iter().any(|n| n == "openid") {
            names.push("openid".to_string());
        }
        names.sort();
        names
    }

    /// Every claim any scope can produce, plus `sub`, sorted and unique.
    #[must_use]
    pub fn all_claims(&self) -> Vec<String> {
        let mut claims: Vec<String> = self
            .0
            .values()
            .flatten()
            .map(|c| c.claim.clone())
            .chain(std::iter::once("sub".to_string()))
            .collect();
        claims.sort();
        claims.dedup();
        claims
    }

    /// Claims granted by the given scopes. Unknown scopes contribute nothing.
    pub fn claims_for<'a>(&'a self, scope: &'a StringSet) -> impl Iterator<Item = &'a ClaimConfig> + 'a {
        scope
            .iter()
            .filter_map(|s| self.0.get(s))
            .flatten()
    }

    /// Directory attributes needed to produce the claims of `scope`.
    #[must_use]
    pub fn attributes_for(&self, scope: &StringSet) -> Vec<String> {
        let mut attrs = Vec::new();
        for claim in self.claims_for(scope) {
            if !attrs.contains(&claim.attribute) {
                attrs.push(claim.attribute.clone());
            }
        }
        attrs
    }
}

/// A registered client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientRegistration {
    /// Display name shown on the login page.
    pub name: Option<String>,
    /// bcrypt hash of the SHA-512 digest of the client secret.
    pub secret: String,
    /// Allowed redirect URIs.
    pub redirect_uri: PatternSet,
    /// Origins allowed to call the userinfo endpoint from a browser.
    pub cors_origin: PatternSet,
    /// PEM public key used to verify signed request objects.
    pub request_key: Option<String>,
}

/// Registered clients keyed by `client_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientConfig(BTreeMap<String, ClientRegistration>);

impl ClientConfig {
    /// Builds a client map from explicit entries.
    #[must_use]
    pub fn new(clients: BTreeMap<String, ClientRegistration>) -> Self {
        Self(clients)
    }

    /// Looks up a client by id.
    #[must_use]
    pub fn get(&self, client_id: &str) -> Option<&ClientRegistration> {
        self.0.get(client_id)
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates clients in `client_id` order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClientRegistration)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` if any client allows `redirect_uri`.
    #[must_use]
    pub fn any_redirect_matches(&self, redirect_uri: &str) -> bool {
        self.0.values().any(|c| c.redirect_uri.matches(redirect_uri))
    }

    /// Returns `true` if any client allows `origin` for CORS.
    #[must_use]
    pub fn any_cors_origin_matches(&self, origin: &str) -> bool {
        self.0.values().any(|c| c.cors_origin.matches(origin))
    }
}

/// Directory connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapConfig {
    /// Server URL, `ldap://` or `ldaps://`.
    pub server: String,
    /// Service account DN or user principal.
    pub user: String,
    /// Service account password.
    pub password: String,
    /// Base DN for user searches.
    pub base_dn: String,
    /// Attribute holding the login name.
    pub id_attribute: String,
    /// Do not attempt StartTLS on `ldap://` connections.
    pub disable_tls: bool,
    /// Connection timeout.
    pub timeout: HumanDuration,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            server: "ldap://localhost".to_string(),
            user: String::new(),
            password: String::new(),
            base_dn: String::new(),
            id_attribute: "sAMAccountName".to_string(),
            disable_tls: false,
            timeout: HumanDuration::from_secs(10),
        }
    }
}

impl LdapConfig {
    fn validate(&self) -> CoreResult<()> {
        let url = Url::parse(&self.server)
            .map_err(|e| CoreError::Invalid(format!("ldap.server {:?}: {e}", self.server)))?;
        if !matches!(url.scheme(), "ldap" | "ldaps") {
            return Err(CoreError::Invalid(format!(
                "ldap.server must use ldap:// or ldaps://: {}",
                self.server
            )));
        }
        if self.id_attribute.is_empty() {
            return Err(CoreError::Invalid("ldap.id_attribute is required".to_string()));
        }
        Ok(())
    }
}

/// Prometheus endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Path serving the exposition format.
    pub path: String,
    /// Basic auth user. Auth is off unless both user and password are set.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: "/metrics".to_string(),
            username: None,
            password: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
issuer: https://auth.example.com
listen: 0.0.0.0:8080
ttl:
  code: 1m
  token: 1h
  sso: 0
client:
  some_client_id:
    secret: "$2a$10$abcdefghijklmnopqrstuu"
    redirect_uri:
      - http://some-client.example.com/callback
    cors_origin:
      - http://some-client.example.com
ldap:
  server: ldaps://ldap.example.com
  base_dn: dc=example,dc=com
scope:
  extra:
    - claim: uid_number
      attribute: uidNumber
      type: number
"#;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ttl.code.as_secs(), 300);
        assert_eq!(config.ttl.sso.as_secs(), 14 * 86400);
        assert_eq!(config.endpoint.authorization, "/login");
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.issuer, "https://auth.example.com");
        assert_eq!(config.listen.port(), 8080);
        assert_eq!(config.ttl.code, HumanDuration::from_mins(1));
        assert_eq!(config.ttl.token, HumanDuration::from_hours(1));
        assert!(config.ttl.sso.is_zero());
        assert_eq!(config.ttl.login, HumanDuration::from_hours(1));
        assert_eq!(config.ldap.id_attribute, "sAMAccountName");

        let client = config.client.get("some_client_id").unwrap();
        assert!(client.redirect_uri.matches("http://some-client.example.com/callback"));
        assert!(config.client.any_cors_origin_matches("http://some-client.example.com"));
        assert!(!config.client.any_cors_origin_matches("http://other.example.com"));
    }

    #[test]
    fn scopes_merge_with_defaults() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(
            config.scope.scope_names(),
            vec!["email", "extra", "groups", "openid", "phone", "profile"]
        );
        let extra = StringSet::parse("extra");
        let claims: Vec<_> = config.scope.claims_for(&extra).collect();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].kind, ClaimType::Number);
    }

    #[test]
    fn attributes_for_scope_are_unique() {
        let scopes = ScopeConfig::default();
        let attrs = scopes.attributes_for(&StringSet::parse("openid profile email profile"));
        assert_eq!(attrs, vec!["displayName", "givenName", "sn", "mail"]);
        assert!(scopes.attributes_for(&StringSet::parse("openid")).is_empty());
    }

    #[test]
    fn rejects_bad_issuer() {
        assert!(Config::from_yaml("issuer: not a url").is_err());
        assert!(Config::from_yaml("issuer: https://example.com/?x=1").is_err());
        assert!(Config::from_yaml("issuer: ftp://example.com").is_err());
    }

    #[test]
    fn rejects_duplicate_endpoints() {
        let err = Config::from_yaml("endpoint:\n  token: /login\n").unwrap_err();
        assert!(err.to_string().contains("share the path"), "{err}");
    }

    #[test]
    fn rejects_reserved_paths() {
        let err = Config::from_yaml("endpoint:\n  logout: /healthz\n").unwrap_err();
        assert!(err.to_string().contains("reserved path"), "{err}");
        let err = Config::from_yaml("metrics:\n  path: /.well-known/openid-configuration\n")
            .unwrap_err();
        assert!(err.to_string().contains("reserved path"), "{err}");
    }

    #[test]
    fn rejects_relative_endpoint() {
        assert!(Config::from_yaml("endpoint:\n  jwks: certs\n").is_err());
    }

    #[test]
    fn rejects_non_ldap_server() {
        assert!(Config::from_yaml("ldap:\n  server: http://ldap.example.com\n").is_err());
    }

    #[test]
    fn rejects_secretless_client_with_client_auth() {
        let yaml = "client:\n  c:\n    redirect_uri: [http://x/cb]\n";
        assert!(Config::from_yaml(yaml).is_err());
        let yaml = "disable_client_auth: true\nclient:\n  c:\n    redirect_uri: [http://x/cb]\n";
        assert!(Config::from_yaml(yaml).is_ok());
    }

    #[test]
    fn load_reads_file_and_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lauth.yml");
        std::fs::write(&path, SAMPLE).unwrap();

        let overrides = Serialized::defaults(issuer_override());
        let config = Config::load(Some(&path), overrides).unwrap();
        assert_eq!(config.issuer, "https://override.example.com");
        assert_eq!(config.ldap.server, "ldaps://ldap.example.com");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Some(Path::new("/nonexistent/lauth.yml")), Figment::new()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    fn issuer_override() -> BTreeMap<&'static str, &'static str> {
        BTreeMap::from([("issuer", "https://override.example.com")])
    }
}
