use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A SIP request method (RFC 3261 §7.1 and the extension RFCs).
///
/// Ingest always uppercases the token first (spec requirement), so this
/// type never holds a lowercase variant; `Extension` preserves whatever
/// token was seen for methods outside the well-known set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Invite,
    Ack,
    Bye,
    Cancel,
    Options,
    Register,
    Prack,
    Subscribe,
    Notify,
    Publish,
    Info,
    Refer,
    Message,
    Update,
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Invite => "INVITE",
            Method::Ack => "ACK",
            Method::Bye => "BYE",
            Method::Cancel => "CANCEL",
            Method::Options => "OPTIONS",
            Method::Register => "REGISTER",
            Method::Prack => "PRACK",
            Method::Subscribe => "SUBSCRIBE",
            Method::Notify => "NOTIFY",
            Method::Publish => "PUBLISH",
            Method::Info => "INFO",
            Method::Refer => "REFER",
            Method::Message => "MESSAGE",
            Method::Update => "UPDATE",
            Method::Extension(s) => s.as_str(),
        }
    }

    pub fn is_invite(&self) -> bool {
        matches!(self, Method::Invite)
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Method::Ack)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Parses an already-uppercased method token (parser callers uppercase
    /// on ingest per the wire-format contract; this accepts any case and
    /// normalizes it here too so the type is safe to construct directly).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.') {
            return Err(Error::InvalidMethod(s.to_string()));
        }
        let upper = s.to_ascii_uppercase();
        Ok(match upper.as_str() {
            "INVITE" => Method::Invite,
            "ACK" => Method::Ack,
            "BYE" => Method::Bye,
            "CANCEL" => Method::Cancel,
            "OPTIONS" => Method::Options,
            "REGISTER" => Method::Register,
            "PRACK" => Method::Prack,
            "SUBSCRIBE" => Method::Subscribe,
            "NOTIFY" => Method::Notify,
            "PUBLISH" => Method::Publish,
            "INFO" => Method::Info,
            "REFER" => Method::Refer,
            "MESSAGE" => Method::Message,
            "UPDATE" => Method::Update,
            other => Method::Extension(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("invite".parse::<Method>().unwrap(), Method::Invite);
        assert_eq!("Bye".parse::<Method>().unwrap(), Method::Bye);
    }

    #[test]
    fn preserves_unknown_tokens() {
        assert_eq!(
            "FOOBAR".parse::<Method>().unwrap(),
            Method::Extension("FOOBAR".into())
        );
    }

    #[test]
    fn display_roundtrips() {
        assert_eq!(Method::Invite.to_string(), "INVITE");
        assert_eq!(Method::Extension("X-CUSTOM".into()).to_string(), "X-CUSTOM");
    }
}
