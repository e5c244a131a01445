use thiserror::Error;

/// Transport-layer errors surfaced to the transaction layer (spec.md §6/§7
/// `TransportError(os_error)`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("no route to {0}")]
    NoRoute(String),

    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    SendFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
