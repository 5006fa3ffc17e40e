//! # lauth-core
//!
//! Configuration and shared utilities for lauth.
//!
//! ## Modules
//!
//! - [`config`] - YAML configuration with client registrations and scope maps
//! - [`duration`] - Human-readable durations such as `1w2d3h`
//! - [`error`] - Error type shared by the utilities in this crate
//! - [`pattern`] - `/`-aware glob patterns for redirect and origin allow-lists
//! - [`string_set`] - Ordered, de-duplicated, space-delimited token lists

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod duration;
pub mod error;
pub mod pattern;
pub mod string_set;

pub use config::{
    ClaimConfig, ClaimType, ClientConfig, ClientRegistration, Config, EndpointConfig, LdapConfig,
    MetricsConfig, ScopeConfig, TtlConfig,
};
pub use duration::HumanDuration;
pub use error::{CoreError, CoreResult};
pub use pattern::{Pattern, PatternSet};
pub use string_set::{StringSet, UnknownElement};
