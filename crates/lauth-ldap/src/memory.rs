//! In-memory directory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{Attributes, Connector, Session};

/// A user entry held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryUser {
    password: String,
    attributes: Attributes,
}

impl MemoryUser {
    /// Creates a user with the given password and no attributes.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            attributes: Attributes::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

/// A directory whose entries live in process memory.
///
/// Entries with the same login name are allowed so that ambiguous lookups can
/// be exercised.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    entries: Arc<RwLock<Vec<(String, MemoryUser)>>>,
    unavailable: bool,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory whose `connect` always fails.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Adds an entry.
    #[must_use]
    pub fn with_user(self, username: impl Into<String>, user: MemoryUser) -> Self {
        self.insert(username, user);
        self
    }

    /// Adds an entry to a shared directory.
    pub fn insert(&self, username: impl Into<String>, user: MemoryUser) {
        self.entries.write().push((username.into(), user));
    }

    /// Number of sessions opened and not yet closed or dropped.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryDirectory {
    async fn connect(&self) -> DirectoryResult<Box<dyn Session>> {
        if self.unavailable {
            return Err(DirectoryError::Connection("directory is unavailable".to_string()));
        }
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            directory: self.clone(),
            closed: false,
        }))
    }
}

struct MemorySession {
    directory: MemoryDirectory,
    closed: bool,
}

impl MemorySession {
    fn find(&self, username: &str) -> DirectoryResult<MemoryUser> {
        let entries = self.directory.entries.read();
        let mut matches = entries.iter().filter(|(name, _)| name == username);
        match (matches.next(), matches.next()) {
            (None, _) => Err(DirectoryError::UserNotFound),
            (Some((_, user)), None) => Ok(user.clone()),
            (Some(_), Some(_)) => Err(DirectoryError::MultipleUsersFound),
        }
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.directory.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn login_test(&mut self, username: &str, password: &str) -> DirectoryResult<()> {
        let user = self.find(username)?;
        if password.is_empty() || user.password != password {
            return Err(DirectoryError::InvalidCredentials);
        }
        Ok(())
    }

    async fn get_user_attributes(
        &mut self,
        username: &str,
        attributes: &[String],
    ) -> DirectoryResult<Attributes> {
        let user = self.find(username)?;
        Ok(attributes
            .iter()
            .filter_map(|name| {
                user.attributes
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| (name.clone(), v.clone()))
            })
            .collect())
    }

    async fn close(mut self: Box<Self>) -> DirectoryResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.release();
    }
}
