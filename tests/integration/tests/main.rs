//! End-to-end tests.
//!
//! These drive the full application router in-process against an
//! in-memory directory.

mod authorization;
mod code_flow;
mod implicit_flow;
mod logout;
mod token_endpoint;
mod userinfo;
