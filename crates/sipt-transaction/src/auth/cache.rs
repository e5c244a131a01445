//! Credential/nonce caching across challenges for the same origin
//! (spec.md §3 `AuthCache`, §4.6).

use std::collections::HashMap;

use sipt_core::auth::{AuthOrigin, Credentials};

#[derive(Debug, Clone)]
struct CacheEntry {
    credentials: Credentials,
    nonce_count: u32,
    /// The most recently learned nonce for this origin/realm/scheme, from
    /// either a challenge or a success response's `nextnonce` (spec.md
    /// §4.6 `Authentication-Info`).
    nonce: Option<String>,
}

/// Remembers, per `(origin, realm, scheme)`, the last credentials that
/// worked and how many times the associated nonce has been reused
/// (spec.md §4.6: nonce-count must strictly increase across uses of the
/// same server nonce).
#[derive(Default)]
pub struct AuthCache {
    entries: HashMap<(AuthOrigin, String, String), CacheEntry>,
}

impl AuthCache {
    pub fn new() -> Self {
        AuthCache::default()
    }

    fn key(origin: &AuthOrigin, realm: &str, scheme: &str) -> (AuthOrigin, String, String) {
        (origin.clone(), realm.to_ascii_lowercase(), scheme.to_ascii_lowercase())
    }

    pub fn credentials_for(&self, origin: &AuthOrigin, realm: &str, scheme: &str) -> Option<Credentials> {
        self.entries
            .get(&Self::key(origin, realm, scheme))
            .map(|e| e.credentials.clone())
    }

    /// The next nonce-count to use for this origin/realm/scheme, starting
    /// at 1 on first use (spec.md §4.6 `nc`).
    pub fn next_nonce_count(&mut self, origin: &AuthOrigin, realm: &str, scheme: &str) -> u32 {
        let key = Self::key(origin, realm, scheme);
        let entry = self.entries.get_mut(&key);
        match entry {
            Some(e) => {
                e.nonce_count += 1;
                e.nonce_count
            }
            None => 1,
        }
    }

    /// Records that `credentials` answered a challenge from this
    /// origin/realm/scheme, at the given nonce-count (spec.md §4.6: cache
    /// on success so subsequent requests in the same realm pre-authenticate).
    pub fn remember(&mut self, origin: &AuthOrigin, realm: &str, scheme: &str, credentials: Credentials, nonce_count: u32) {
        let nonce = self.entries.get(&Self::key(origin, realm, scheme)).and_then(|e| e.nonce.clone());
        self.entries.insert(
            Self::key(origin, realm, scheme),
            CacheEntry {
                credentials,
                nonce_count,
                nonce,
            },
        );
    }

    pub fn last_nonce(&self, origin: &AuthOrigin, realm: &str, scheme: &str) -> Option<String> {
        self.entries.get(&Self::key(origin, realm, scheme)).and_then(|e| e.nonce.clone())
    }

    /// Rolls the cached nonce forward, resetting the nonce-count (spec.md
    /// §4.6 `nextnonce`): the server is handing out a fresh nonce for
    /// preemptive use on the next request in this realm.
    pub fn set_next_nonce(&mut self, origin: &AuthOrigin, realm: &str, scheme: &str, nonce: String) {
        if let Some(entry) = self.entries.get_mut(&Self::key(origin, realm, scheme)) {
            entry.nonce = Some(nonce);
            entry.nonce_count = 0;
        }
    }

    /// Drops a cached entry, e.g. after a `stale=false` rejection that
    /// cannot be a simple nonce refresh (spec.md §4.6).
    pub fn invalidate(&mut self, origin: &AuthOrigin, realm: &str, scheme: &str) {
        self.entries.remove(&Self::key(origin, realm, scheme));
    }
}
