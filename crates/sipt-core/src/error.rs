use thiserror::Error;

/// Errors surfaced while parsing or mutating a [`crate::message::Message`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("message could not be parsed")]
    ParseFailed,

    #[error("invalid method: {0}")]
    InvalidMethod(String),

    #[error("invalid status code: {0}")]
    InvalidStatusCode(String),

    #[error("invalid SIP version")]
    InvalidVersion,

    #[error("invalid request-uri: {0}")]
    InvalidUri(String),

    #[error("header {0:?} is non-coalescing and cannot be normalized into a single value")]
    NonCoalescingHeader(String),

    #[error("missing required header: {0}")]
    MissingHeader(String),

    #[error("invalid auth parameter: {0}")]
    InvalidAuthParam(String),
}

pub type Result<T> = std::result::Result<T, Error>;
