//! LDAP-backed directory.
//!
//! Each session opens its own connection, binds the service account, and
//! upgrades with StartTLS unless the URL is `ldaps://` or TLS is disabled.
//! Users are located with `(&(objectClass=person)(<id_attribute>=<name>))`
//! below the base DN.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry, SearchOptions, SearchResult};
use url::Url;

use lauth_core::LdapConfig;

use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{Attributes, Connector, Session};

const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_UNWILLING_TO_PERFORM: u32 = 53;

/// Requests no attributes in a search.
const NO_ATTRIBUTES: &str = "1.1";

/// Escapes a value for use inside an LDAP filter (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

#[derive(Debug)]
struct Settings {
    url: String,
    starttls: bool,
    timeout: Duration,
    user: String,
    password: String,
    base_dn: String,
    id_attribute: String,
}

impl Settings {
    fn user_filter(&self, username: &str) -> String {
        format!(
            "(&(objectClass=person)({}={}))",
            self.id_attribute,
            escape_filter_value(username)
        )
    }
}

/// Connector for an LDAP or Active Directory server.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    settings: Arc<Settings>,
}

impl LdapConnector {
    /// Creates a connector from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is not `ldap://` or `ldaps://`.
    pub fn new(config: &LdapConfig) -> DirectoryResult<Self> {
        let url = Url::parse(&config.server)
            .map_err(|e| DirectoryError::Connection(format!("invalid server URL: {e}")))?;
        let starttls = match url.scheme() {
            "ldaps" => false,
            "ldap" => !config.disable_tls,
            other => {
                return Err(DirectoryError::Connection(format!(
                    "unsupported scheme {other:?}"
                )))
            }
        };
        Ok(Self {
            settings: Arc::new(Settings {
                url: config.server.clone(),
                starttls,
                timeout: config.timeout.into(),
                user: config.user.clone(),
                password: config.password.clone(),
                base_dn: config.base_dn.clone(),
                id_attribute: config.id_attribute.clone(),
            }),
        })
    }

    /// Whether connections upgrade with StartTLS.
    #[must_use]
    pub fn uses_starttls(&self) -> bool {
        self.settings.starttls
    }

    /// The search filter used to locate `username`.
    #[must_use]
    pub fn user_filter(&self, username: &str) -> String {
        self.settings.user_filter(username)
    }
}

#[async_trait]
impl Connector for LdapConnector {
    async fn connect(&self) -> DirectoryResult<Box<dyn Session>> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.settings.timeout)
            .set_starttls(self.settings.starttls);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.settings.url)
            .await
            .map_err(|e| {
                if self.settings.starttls {
                    DirectoryError::Tls(e.to_string())
                } else {
                    DirectoryError::Connection(e.to_string())
                }
            })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "LDAP connection driver error");
            }
        });

        let mut session = LdapSession {
            ldap,
            settings: Arc::clone(&self.settings),
            closed: false,
        };
        session.bind_service().await?;
        Ok(Box::new(session))
    }
}

struct LdapSession {
    ldap: Ldap,
    settings: Arc<Settings>,
    closed: bool,
}

impl LdapSession {
    async fn bind_service(&mut self) -> DirectoryResult<()> {
        self.ldap
            .simple_bind(&self.settings.user, &self.settings.password)
            .await
            .map_err(|e| DirectoryError::Connection(e.to_string()))?
            .success()
            .map_err(|e| DirectoryError::ServiceBind(e.to_string()))?;
        Ok(())
    }

    async fn find_entry(&mut self, username: &str, attributes: Vec<&str>) -> DirectoryResult<SearchEntry> {
        let filter = self.settings.user_filter(username);
        let SearchResult(entries, result) = self
            .ldap
            .with_search_options(SearchOptions::new().sizelimit(2))
            .search(&self.settings.base_dn, Scope::Subtree, &filter, attributes)
            .await
            .map_err(|e| DirectoryError::Search(e.to_string()))?;

        match result.rc {
            RC_SUCCESS => {}
            RC_SIZE_LIMIT_EXCEEDED => return Err(DirectoryError::MultipleUsersFound),
            rc => {
                return Err(DirectoryError::Search(format!("rc={rc}: {}", result.text)));
            }
        }

        let mut entries = entries.into_iter();
        match (entries.next(), entries.next()) {
            (None, _) => Err(DirectoryError::UserNotFound),
            (Some(entry), None) => Ok(SearchEntry::construct(entry)),
            (Some(_), Some(_)) => Err(DirectoryError::MultipleUsersFound),
        }
    }
}

#[async_trait]
impl Session for LdapSession {
    async fn login_test(&mut self, username: &str, password: &str) -> DirectoryResult<()> {
        // An empty password is an unauthenticated bind, which most servers accept.
        if password.is_empty() {
            return Err(DirectoryError::InvalidCredentials);
        }

        let entry = self.find_entry(username, vec![NO_ATTRIBUTES]).await?;
        let result = self
            .ldap
            .simple_bind(&entry.dn, password)
            .await
            .map_err(|e| DirectoryError::Connection(e.to_string()))?;

        let outcome = match result.rc {
            RC_SUCCESS => Ok(()),
            RC_INVALID_CREDENTIALS | RC_UNWILLING_TO_PERFORM => {
                Err(DirectoryError::InvalidCredentials)
            }
            rc => Err(DirectoryError::Search(format!("user bind rc={rc}: {}", result.text))),
        };

        self.bind_service().await?;
        outcome
    }

    async fn get_user_attributes(
        &mut self,
        username: &str,
        attributes: &[String],
    ) -> DirectoryResult<Attributes> {
        let requested: Vec<&str> = if attributes.is_empty() {
            vec![NO_ATTRIBUTES]
        } else {
            attributes.iter().map(String::as_str).collect()
        };
        let entry = self.find_entry(username, requested).await?;

        let mut out = Attributes::new();
        for name in attributes {
            if let Some(values) = entry
                .attrs
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
            {
                out.insert(name.clone(), values.clone());
            }
        }
        Ok(out)
    }

    async fn close(mut self: Box<Self>) -> DirectoryResult<()> {
        self.closed = true;
        self.ldap
            .unbind()
            .await
            .map_err(|e| DirectoryError::Connection(e.to_string()))
    }
}

impl Drop for LdapSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let mut ldap = self.ldap.clone();
            handle.spawn(async move {
                let _ = ldap.unbind().await;
            });
        }
    }
}
