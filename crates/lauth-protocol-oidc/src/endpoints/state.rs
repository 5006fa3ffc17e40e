//! Shared state for OIDC endpoints.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use url::Url;

use lauth_core::{Config, StringSet};
use lauth_ldap::{Connector, DirectoryResult};

use crate::discovery::ProviderMetadata;
use crate::error::{OidcError, OidcResult};
use crate::jwks::JsonWebKeySet;
use crate::mapper::map_claims;
use crate::token::{now, TokenManager};

/// Key set certificates live for an hour; reissue them after half of that.
const JWKS_REFRESH_SECS: i64 = 30 * 60;

/// Random pause after a failed login.
///
/// The generator is seeded once, when the delay is created.
#[derive(Debug)]
pub struct LoginDelay {
    rng: Mutex<StdRng>,
    range: Option<RangeInclusive<u64>>,
}

impl LoginDelay {
    /// Uniform delay between `min_ms` and `max_ms` milliseconds.
    #[must_use]
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
            range: Some(min_ms.min(max_ms)..=max_ms.max(min_ms)),
        }
    }

    /// No delay at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            range: None,
        }
    }

    /// Sleeps for a random duration within the range.
    pub async fn wait(&self) {
        let Some(range) = &self.range else {
            return;
        };
        let millis = self.rng.lock().random_range(range.clone());
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

impl Default for LoginDelay {
    fn default() -> Self {
        Self::new(100, 500)
    }
}

/// Everything the endpoints need, built once at startup.
pub struct Provider {
    /// Server configuration.
    pub config: Config,
    /// Parsed issuer.
    pub issuer: Url,
    /// Token minting and parsing.
    pub tokens: TokenManager,
    /// Directory session factory.
    pub directory: Arc<dyn Connector>,
    /// Pause applied after failed logins.
    pub login_delay: LoginDelay,
    /// Discovery document.
    pub metadata: ProviderMetadata,
    jwks: Mutex<(i64, JsonWebKeySet)>,
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("issuer", &self.issuer.as_str())
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Builds the provider state.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if the issuer is not a URL or the key set
    /// cannot be built.
    pub fn new(
        config: Config,
        tokens: TokenManager,
        directory: Arc<dyn Connector>,
    ) -> OidcResult<Self> {
        let issuer = config
            .issuer_url()
            .map_err(|e| OidcError::server_error("invalid issuer").caused_by(e))?;
        let jwks = key_set(&tokens, &issuer)?;
        let metadata = ProviderMetadata::from_config(&config, &issuer);

        Ok(Self {
            config,
            issuer,
            tokens,
            directory,
            login_delay: LoginDelay::default(),
            metadata,
            jwks: Mutex::new((now(), jwks)),
        })
    }

    /// Replaces the failed-login delay.
    #[must_use]
    pub fn with_login_delay(mut self, login_delay: LoginDelay) -> Self {
        self.login_delay = login_delay;
        self
    }

    /// Published signing keys, with a certificate reissued before it expires.
    ///
    /// # Errors
    ///
    /// Returns `server_error` if a new certificate cannot be issued.
    pub fn jwks(&self) -> OidcResult<JsonWebKeySet> {
        self.jwks_at(now())
    }

    fn jwks_at(&self, now: i64) -> OidcResult<JsonWebKeySet> {
        let mut cached = self.jwks.lock();
        if now - cached.0 >= JWKS_REFRESH_SECS {
            *cached = (now, key_set(&self.tokens, &self.issuer)?);
            tracing::debug!("reissued key set certificate");
        }
        Ok(cached.1.clone())
    }

    /// Whether the issuer is served over TLS.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.issuer.scheme() == "https"
    }

    /// Display name of a client, falling back to its id.
    #[must_use]
    pub fn client_name<'a>(&'a self, client_id: &'a str) -> &'a str {
        self.config
            .client
            .get(client_id)
            .and_then(|c| c.name.as_deref())
            .unwrap_or(client_id)
    }

    /// Verifies a password in a fresh directory session.
    pub async fn login(&self, username: &str, password: &str) -> DirectoryResult<()> {
        let mut session = self.directory.connect().await?;
        let result = session.login_test(username, password).await;
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "failed to close directory session");
        }
        result
    }

    /// Reads the attributes behind `scope` and maps them to claims.
    ///
    /// The directory is always consulted, so a missing user is reported even
    /// when the scope needs no attributes.
    pub async fn userinfo(
        &self,
        subject: &str,
        scope: &StringSet,
    ) -> DirectoryResult<Map<String, Value>> {
        let attributes = self.config.scope.attributes_for(scope);
        let mut session = self.directory.connect().await?;
        let result = session.get_user_attributes(subject, &attributes).await;
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "failed to close directory session");
        }
        let values = result?;
        Ok(map_claims(
            subject,
            &values,
            self.config.scope.claims_for(scope),
        ))
    }
}

fn key_set(tokens: &TokenManager, issuer: &Url) -> OidcResult<JsonWebKeySet> {
    tokens
        .jwks(issuer.host_str().unwrap_or("localhost"))
        .map_err(|e| OidcError::server_error("failed to build key set").caused_by(e))
}

/// Shared state for OIDC endpoints.
#[derive(Debug, Clone)]
pub struct OidcState {
    /// Provider shared by every request.
    pub provider: Arc<Provider>,
}

impl OidcState {
    /// Creates a new OIDC state.
    #[must_use]
    pub fn new(provider: Provider) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Creates a new OIDC state from an Arc.
    #[must_use]
    pub const fn from_arc(provider: Arc<Provider>) -> Self {
        Self { provider }
    }
}
