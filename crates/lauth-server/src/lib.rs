//! # lauth-server
//!
//! HTTP server for the lauth OpenID Connect provider.
//!
//! This crate wires the pieces together:
//! - configuration loading with CLI overrides
//! - the signing key, loaded from PEM or generated at startup
//! - the LDAP directory connector
//! - the OIDC router plus health, metrics and security headers
//!
//! ## Usage
//!
//! ```ignore
//! use lauth_core::Config;
//! use lauth_server::Server;
//!
//! let config = Config::load(Some(path), overrides)?;
//! let server = Server::new(config).await?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod router;

pub use cli::Cli;
pub use router::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;

use lauth_core::Config;
use lauth_crypto::RsaKey;
use lauth_ldap::{Connector, LdapConnector};
use lauth_protocol_oidc::{OidcState, Provider, TokenManager};

/// The lauth server.
pub struct Server {
    state: OidcState,
    metrics: PrometheusHandle,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// Loads or generates the signing key, checks that the directory is
    /// reachable and installs the global metrics recorder.
    ///
    /// # Errors
    ///
    /// Fails when the key cannot be read, the directory cannot be reached or
    /// a metrics recorder is already installed.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let key = match &config.sign_key {
            Some(path) => RsaKey::load(path)
                .with_context(|| format!("failed to load signing key {}", path.display()))?,
            None => {
                tracing::warn!("no sign_key configured; generating a temporary key");
                RsaKey::generate().context("failed to generate signing key")?
            }
        };
        tracing::info!(kid = key.key_id(), "signing key ready");

        let tokens = TokenManager::new(config.issuer.clone(), config.ttl, key)
            .context("failed to set up token manager")?;

        let connector = LdapConnector::new(&config.ldap).context("invalid ldap settings")?;
        connector
            .connect()
            .await
            .with_context(|| format!("failed to connect to {}", config.ldap.server))?
            .close()
            .await
            .context("failed to close directory check session")?;
        tracing::info!(server = %config.ldap.server, "directory is reachable");

        let provider = Provider::new(config, tokens, Arc::new(connector))
            .context("failed to set up provider")?;

        let metrics = PrometheusBuilder::new()
            .install_recorder()
            .context("failed to install metrics recorder")?;
        describe_metrics();

        Ok(Self::from_parts(provider, metrics))
    }

    /// Builds a server around an existing provider and metrics handle.
    #[must_use]
    pub fn from_parts(provider: Provider, metrics: PrometheusHandle) -> Self {
        Self {
            state: OidcState::new(provider),
            metrics,
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.state.provider.config
    }

    /// Returns the provider serving requests.
    #[must_use]
    pub fn provider(&self) -> &Provider {
        &self.state.provider
    }

    /// Creates the application router without starting the server.
    pub fn router(&self) -> Router {
        create_router(self.state.clone(), self.metrics.clone())
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    ///
    /// # Errors
    ///
    /// Fails when the listen address cannot be bound.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config().listen;
        let app = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to listen on {addr}"))?;

        tracing::info!(
            issuer = %self.state.provider.issuer,
            "listening on http://{}",
            addr
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        tracing::info!("server shutdown complete");
        Ok(())
    }
}

fn describe_metrics() {
    metrics::describe_counter!("lauth_authz_total", "Authorization responses issued");
    metrics::describe_counter!("lauth_login_total", "Password logins attempted");
    metrics::describe_counter!("lauth_token_total", "Token endpoint requests");
    metrics::describe_counter!("lauth_userinfo_total", "Userinfo endpoint requests");
    metrics::describe_counter!("lauth_logout_total", "Logout requests");
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
