//! SIP message parsing, normalization, and digest-auth data types
//! (spec.md §3, §4.1, §6).
//!
//! This crate is the leaf of the workspace (see SPEC_FULL.md §0): it has no
//! dependency on `sipt-transport` or `sipt-transaction` and exposes the
//! wire-format and type vocabulary both of those crates build on.

pub mod auth;
pub mod error;
pub mod message;
pub mod numeric;
pub mod parser;
pub mod types;

pub use error::{Error, Result};
pub use message::{Headers, Message, Request, Response};
pub use parser::parse_message;
pub use types::{HttpDate, Method, StatusCode, Uri, ViaEntry};
