//! RFC 3261 §17 transaction layer: message-independent client/server
//! transaction state machines, a registry that routes inbound/outbound
//! traffic to them, and a Digest auth controller layered on top (spec.md
//! §1).
//!
//! Real transport I/O and dialog/core logic above the transaction layer
//! are out of scope (spec.md §1); [`sipt_transport::Transport`] is the
//! seam this crate is built against.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod key;
pub mod registry;
pub mod server;

pub use config::TransactionConfig;
pub use error::{Error, Result};
pub use events::TransactionEvent;
pub use key::TransactionKey;
pub use registry::TransactionLayer;
