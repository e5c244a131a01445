use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A 3-digit SIP status code, 100-699 per RFC 3261 §7.2.
///
/// Stored as a bare `u16` newtype rather than an exhaustive enum: unknown
/// codes in the 1xx-6xx ranges are common (vendor extensions) and must
/// still round-trip and classify correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatusCode(u16);

impl StatusCode {
    pub const TRYING: StatusCode = StatusCode(100);
    pub const RINGING: StatusCode = StatusCode(180);
    pub const OK: StatusCode = StatusCode(200);
    pub const UNAUTHORIZED: StatusCode = StatusCode(401);
    pub const PROXY_AUTH_REQUIRED: StatusCode = StatusCode(407);

    /// Constructs a status code, enforcing the 100-699 range spec.md §3 and
    /// §4.1 require ("status-code must be three digits (100-999)" at parse
    /// time, narrowed to 100-699 by the data model invariant in §3).
    pub fn new(code: u16) -> Result<Self, Error> {
        if (100..=699).contains(&code) {
            Ok(StatusCode(code))
        } else {
            Err(Error::InvalidStatusCode(code.to_string()))
        }
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// `response_code / 100`, the "class" the client/server FSMs switch on.
    pub fn class(self) -> u16 {
        self.0 / 100
    }

    pub fn is_provisional(self) -> bool {
        self.class() == 1
    }

    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    pub fn is_final(self) -> bool {
        self.class() >= 2
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl TryFrom<u16> for StatusCode {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        StatusCode::new(value)
    }
}
