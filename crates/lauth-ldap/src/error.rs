//! Directory error types.
//!
//! Messages never include passwords or bind credentials.

use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = std::result::Result<T, DirectoryError>;

/// Directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The server could not be reached or the connection dropped.
    #[error("directory connection failed: {0}")]
    Connection(String),

    /// StartTLS negotiation failed.
    #[error("directory TLS error: {0}")]
    Tls(String),

    /// The service account could not bind.
    #[error("directory service bind failed: {0}")]
    ServiceBind(String),

    /// The user exists but the password was rejected.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// No entry matched the login name.
    #[error("user not found")]
    UserNotFound,

    /// More than one entry matched the login name.
    #[error("multiple users found")]
    MultipleUsersFound,

    /// A search failed for a reason other than the above.
    #[error("directory search failed: {0}")]
    Search(String),
}

impl DirectoryError {
    /// Returns `true` for outcomes caused by what the user typed rather than
    /// by the directory being unavailable.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::UserNotFound | Self::MultipleUsersFound
        )
    }
}
