//! # lauth-ldap
//!
//! Directory access for lauth.
//!
//! A [`Connector`] opens one [`Session`] per request. Sessions verify user
//! passwords and fetch user attributes; they must be closed when the request
//! is done. Dropping a session without closing it still releases the
//! connection, in the background.
//!
//! ## Modules
//!
//! - [`error`] - Directory error type
//! - [`ldap`] - ldap3-backed connector
//! - [`memory`] - In-memory directory for tests and demos
//! - [`session`] - `Connector` and `Session` traits

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ldap;
pub mod memory;
pub mod session;

pub use error::{DirectoryError, DirectoryResult};
pub use ldap::{escape_filter_value, LdapConnector};
pub use memory::{MemoryDirectory, MemoryUser};
pub use session::{Attributes, Connector, Session};
