//! Directory session traits.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::DirectoryResult;

/// Attribute name to values, as returned by the directory.
pub type Attributes = HashMap<String, Vec<String>>;

/// Factory for per-request directory sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a session bound as the service account.
    async fn connect(&self) -> DirectoryResult<Box<dyn Session>>;
}

/// A directory session scoped to one request.
#[async_trait]
pub trait Session: Send {
    /// Verifies `password` for the user whose login name is `username`.
    ///
    /// Returns [`DirectoryError::InvalidCredentials`](crate::DirectoryError::InvalidCredentials)
    /// when the password is wrong or empty.
    async fn login_test(&mut self, username: &str, password: &str) -> DirectoryResult<()>;

    /// Fetches the requested attributes of `username`. Attributes the entry
    /// lacks are absent from the map; keys use the spelling of `attributes`.
    async fn get_user_attributes(
        &mut self,
        username: &str,
        attributes: &[String],
    ) -> DirectoryResult<Attributes>;

    /// Ends the session.
    async fn close(self: Box<Self>) -> DirectoryResult<()>;
}
