/// A username/password identity used to answer an auth challenge
/// (spec.md §3 `AuthCredentials`). Stored as text; A1 hashing converts to
/// UTF-8 bytes (see DESIGN.md's realm-encoding Open Question note).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// The `(scheme, host, port)` triple an `AuthCache` entry is keyed by,
/// deliberately omitting user and path (spec.md §3 `AuthCache`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuthOrigin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl AuthOrigin {
    pub fn from_uri(uri: &crate::types::Uri) -> AuthOrigin {
        AuthOrigin {
            scheme: uri.scheme().to_string(),
            host: uri.host.to_ascii_lowercase(),
            port: uri.effective_port(),
        }
    }
}
