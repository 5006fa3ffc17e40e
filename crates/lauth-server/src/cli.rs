//! CLI argument parsing.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use figment::providers::Serialized;
use serde::Serialize;
use serde_json::{json, Map, Value};

use lauth_core::{Config, CoreResult};
use lauth_crypto::{generate_secret, hash_secret, SECRET_LENGTH};

/// lauth - OpenID Connect provider backed by LDAP.
#[derive(Debug, Parser)]
#[command(name = "lauth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (YAML).
    #[arg(short, long, env = "LAUTH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Issuer URL.
    #[arg(long, global = true)]
    pub issuer: Option<String>,

    /// Listen address.
    #[arg(long, global = true)]
    pub listen: Option<SocketAddr>,

    /// PEM file holding the RSA signing key.
    #[arg(long, global = true)]
    pub sign_key: Option<PathBuf>,

    /// LDAP server URL.
    #[arg(long, global = true)]
    pub ldap: Option<String>,

    /// LDAP service account.
    #[arg(long, global = true)]
    pub ldap_user: Option<String>,

    /// LDAP service account password.
    #[arg(long, env = "LAUTH_LDAP_PASSWORD", hide_env_values = true, global = true)]
    pub ldap_password: Option<String>,

    /// LDAP base DN for user searches.
    #[arg(long, global = true)]
    pub ldap_base_dn: Option<String>,

    /// LDAP attribute holding the login name.
    #[arg(long, global = true)]
    pub ldap_id_attribute: Option<String>,

    /// Do not use StartTLS on ldap:// connections.
    #[arg(long, global = true)]
    pub ldap_disable_tls: bool,

    /// Allow response types that return tokens from the authorization endpoint.
    #[arg(long, global = true)]
    pub allow_implicit_flow: bool,

    /// Accept token requests without client credentials.
    #[arg(long, global = true)]
    pub disable_client_auth: bool,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the provider (the default).
    Serve,

    /// Print a client registration with a freshly generated secret.
    GenClient(GenClientArgs),
}

/// Arguments for `gen-client`.
#[derive(Debug, clap::Args)]
pub struct GenClientArgs {
    /// Client ID.
    pub client_id: String,

    /// Display name shown on the login page.
    #[arg(long)]
    pub name: Option<String>,

    /// Allowed redirect URI pattern (repeatable).
    #[arg(long = "redirect-uri")]
    pub redirect_uri: Vec<String>,

    /// Allowed CORS origin pattern (repeatable).
    #[arg(long = "cors-origin")]
    pub cors_origin: Vec<String>,
}

impl Cli {
    /// Configuration values set on the command line, shaped like the YAML file.
    #[must_use]
    pub fn overrides(&self) -> Value {
        let mut root = Map::new();
        let mut ldap = Map::new();

        if let Some(issuer) = &self.issuer {
            root.insert("issuer".into(), json!(issuer));
        }
        if let Some(listen) = &self.listen {
            root.insert("listen".into(), json!(listen));
        }
        if let Some(sign_key) = &self.sign_key {
            root.insert("sign_key".into(), json!(sign_key));
        }
        if self.allow_implicit_flow {
            root.insert("allow_implicit_flow".into(), json!(true));
        }
        if self.disable_client_auth {
            root.insert("disable_client_auth".into(), json!(true));
        }

        let fields = [
            ("server", &self.ldap),
            ("user", &self.ldap_user),
            ("password", &self.ldap_password),
            ("base_dn", &self.ldap_base_dn),
            ("id_attribute", &self.ldap_id_attribute),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                ldap.insert(key.into(), json!(value));
            }
        }
        if self.ldap_disable_tls {
            ldap.insert("disable_tls".into(), json!(true));
        }
        if !ldap.is_empty() {
            root.insert("ldap".into(), Value::Object(ldap));
        }

        Value::Object(root)
    }

    /// Loads the configuration file with command line overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or validation fails.
    pub fn load_config(&self) -> CoreResult<Config> {
        Config::load(
            self.config.as_deref(),
            Serialized::defaults(self.overrides()),
        )
    }
}

#[derive(Serialize)]
struct ClientSnippet<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    secret: String,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    redirect_uri: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    cors_origin: &'a [String],
}

impl GenClientArgs {
    /// Generates a secret and renders the `client` section for the config file.
    ///
    /// The plain secret appears only in a comment above the snippet.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing or serialization fails.
    pub fn render(&self) -> anyhow::Result<String> {
        let secret = generate_secret(SECRET_LENGTH);
        let snippet = ClientSnippet {
            name: self.name.as_deref(),
            secret: hash_secret(&secret)?,
            redirect_uri: &self.redirect_uri,
            cors_origin: &self.cors_origin,
        };

        let mut clients = BTreeMap::new();
        clients.insert(self.client_id.as_str(), snippet);
        let mut root = BTreeMap::new();
        root.insert("client", clients);

        let yaml = serde_yaml::to_string(&root)?;
        Ok(format!(
            "# client_id: {}\n# client_secret: {secret}\n{yaml}",
            self.client_id
        ))
    }
}
