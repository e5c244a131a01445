use thiserror::Error;

/// Error kinds surfaced by the transaction layer (spec.md §7). Transport
/// errors and timeouts are reported by key to the upper core asynchronously
/// via [`crate::events::TransactionEvent`] and never through this type's
/// propagation out of `send_request`/`send_response` (spec.md §7
/// "Propagation").
#[derive(Debug, Error, Clone)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] sipt_core::Error),

    #[error("transaction timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("layer aborted")]
    Aborted,

    #[error("proxy challenge received after a server challenge in the same chain")]
    UnexpectedProxyAuth,

    #[error("challenge target does not match status code {0}")]
    UnexpectedResponse(u16),

    #[error("auth handler rejected the supplied credentials")]
    InvalidAuthCredentials,

    #[error("no credentials available for this challenge")]
    MissingAuthCredentials,

    #[error("unsupported auth scheme: {0}")]
    UnsupportedAuthScheme(String),

    #[error("no transaction registered for key {0}")]
    UnknownTransaction(String),
}

pub type Result<T> = std::result::Result<T, Error>;
