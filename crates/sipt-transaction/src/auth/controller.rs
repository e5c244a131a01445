//! Drives the challenge/response side of RFC 2617 digest auth across a
//! retry chain (spec.md §3 `AuthController`, §4.6), grounded on
//! `auth-core`'s `AuthClient` challenge-target tracking but narrowed to
//! the single `AuthHandlerDigest` scheme this crate ships.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sipt_core::auth::{AuthOrigin, Challenge, Credentials};
use sipt_core::{Request, Response};

use crate::auth::cache::AuthCache;
use crate::auth::digest::{AuthHandlerDigest, DigestRequest, NonceGenerator};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChallengeTarget {
    Server,
    Proxy,
}

/// Drives Digest challenge/response for one transaction user: caches
/// working credentials per origin/realm, tracks the server/proxy target
/// of the last challenge answered for each origin, and disables a
/// scheme/origin pair once its credentials are rejected outright (spec.md
/// §4.6, §7).
pub struct AuthController {
    cache: AuthCache,
    digest: AuthHandlerDigest,
    default_credentials: Option<Credentials>,
    last_target: HashMap<AuthOrigin, ChallengeTarget>,
    last_realm: HashMap<AuthOrigin, String>,
    disabled: HashSet<(AuthOrigin, String)>,
}

impl AuthController {
    pub fn new(default_credentials: Option<Credentials>) -> Self {
        AuthController::with_nonce_generator(default_credentials, Arc::new(crate::auth::digest::DynamicNonceGenerator))
    }

    pub fn with_nonce_generator(default_credentials: Option<Credentials>, nonce_generator: Arc<dyn NonceGenerator>) -> Self {
        AuthController {
            cache: AuthCache::new(),
            digest: AuthHandlerDigest::new(nonce_generator),
            default_credentials,
            last_target: HashMap::new(),
            last_realm: HashMap::new(),
            disabled: HashSet::new(),
        }
    }

    /// Seeds explicit credentials for one origin/realm ahead of any
    /// challenge, e.g. from configuration rather than a one-shot default.
    pub fn seed_credentials(&mut self, origin: &AuthOrigin, realm: &str, credentials: Credentials) {
        self.cache.remember(origin, realm, "digest", credentials, 0);
    }

    /// Answers `challenge_response` (a 401 or 407 to `request`) by adding
    /// an `Authorization`/`Proxy-Authorization` header to `request`
    /// in-place (spec.md §4.6 `add_authorization_headers`).
    ///
    /// Returns [`Error::UnexpectedProxyAuth`] if a proxy challenge follows
    /// a server challenge already answered for the same origin in this
    /// chain, [`Error::UnsupportedAuthScheme`] if no `Digest` challenge is
    /// present, and [`Error::MissingAuthCredentials`]/
    /// [`Error::InvalidAuthCredentials`] when no usable credentials exist.
    pub fn add_authorization_headers(&mut self, request: &mut Request, challenge_response: &Response) -> Result<()> {
        let status = challenge_response.status.as_u16();
        let (target, challenge_header, auth_header) = match status {
            401 => (ChallengeTarget::Server, "WWW-Authenticate", "Authorization"),
            407 => (ChallengeTarget::Proxy, "Proxy-Authenticate", "Proxy-Authorization"),
            other => return Err(Error::UnexpectedResponse(other)),
        };

        let origin = AuthOrigin::from_uri(&request.request_uri);

        if let Some(ChallengeTarget::Server) = self.last_target.get(&origin) {
            if target == ChallengeTarget::Proxy {
                return Err(Error::UnexpectedProxyAuth);
            }
        }
        self.last_target.insert(origin.clone(), target);

        let challenge = challenge_response
            .headers
            .enumerate_header(challenge_header)
            .iter()
            .find_map(|v| Challenge::parse(v).filter(|c| c.scheme_eq("digest")))
            .ok_or_else(|| Error::UnsupportedAuthScheme(challenge_header.to_string()))?;

        let realm = challenge.realm.clone();
        let scheme_key = (origin.clone(), "digest".to_string());

        if self.disabled.contains(&scheme_key) && !challenge.stale() {
            return Err(Error::InvalidAuthCredentials);
        }

        let already_cached = self.cache.credentials_for(&origin, &realm, "digest").is_some();
        if already_cached && !challenge.stale() {
            self.disabled.insert(scheme_key);
            self.cache.invalidate(&origin, &realm, "digest");
            return Err(Error::InvalidAuthCredentials);
        }

        let credentials = self
            .cache
            .credentials_for(&origin, &realm, "digest")
            .or_else(|| self.default_credentials.clone())
            .ok_or(Error::MissingAuthCredentials)?;

        if challenge.stale() {
            self.cache.invalidate(&origin, &realm, "digest");
        }

        let nonce_count = self.cache.next_nonce_count(&origin, &realm, "digest");
        let digest_uri = request.request_uri.to_string();
        let digest_request = DigestRequest {
            method: request.method.as_str(),
            digest_uri: &digest_uri,
            body: &request.body,
            nonce_count,
        };
        let answer = self.digest.answer(&challenge, &credentials, &digest_request);

        request.headers.remove_header(auth_header);
        request.headers.push_raw(auth_header, answer.to_header_value());
        self.cache.remember(&origin, &realm, "digest", credentials, nonce_count);
        self.last_realm.insert(origin, realm);

        Ok(())
    }

    /// Observes a successful final response to a challenged request,
    /// rolling the cached nonce forward from `Authentication-Info`'s
    /// `nextnonce` when present, and re-enabling the scheme for this
    /// origin (spec.md §4.6).
    pub fn observe_success(&mut self, request: &Request, response: &Response) {
        let origin = AuthOrigin::from_uri(&request.request_uri);
        self.disabled.remove(&(origin.clone(), "digest".to_string()));

        let Some(info) = response.headers.enumerate_header("Authentication-Info").into_iter().next() else {
            return;
        };
        let Some(realm) = self.last_realm.get(&origin).cloned() else {
            return;
        };
        for param in info.split(',') {
            if let Some((k, v)) = param.split_once('=') {
                if k.trim().eq_ignore_ascii_case("nextnonce") {
                    let nonce = v.trim().trim_matches('"').to_string();
                    self.cache.set_next_nonce(&origin, &realm, "digest", nonce);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::digest::FixedNonceGenerator;
    use sipt_core::{Method, Request, Response, StatusCode};

    fn invite_to(uri: &str) -> Request {
        Request::new(Method::Invite, uri.parse().unwrap())
    }

    fn challenge_401() -> Response {
        let mut resp = Response::new(StatusCode::UNAUTHORIZED, "Unauthorized");
        resp.headers.add_header(
            r#"WWW-Authenticate: Digest realm="atlanta.com", nonce="84a4cc6f3082121f32b42a2187831a9e", qop="auth""#,
        );
        resp
    }

    #[test]
    fn adds_authorization_header_with_available_credentials() {
        let mut controller = AuthController::with_nonce_generator(
            Some(Credentials::new("bob", "zanzibar")),
            Arc::new(FixedNonceGenerator("0a4f113b".to_string())),
        );
        let mut req = invite_to("sip:bob@biloxi.com");
        controller.add_authorization_headers(&mut req, &challenge_401()).unwrap();
        assert_eq!(req.headers.header_count("Authorization"), 1);
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let mut controller = AuthController::new(None);
        let mut req = invite_to("sip:bob@biloxi.com");
        let err = controller.add_authorization_headers(&mut req, &challenge_401()).unwrap_err();
        assert!(matches!(err, Error::MissingAuthCredentials));
    }

    #[test]
    fn repeated_non_stale_challenge_is_rejected() {
        let mut controller = AuthController::with_nonce_generator(
            Some(Credentials::new("bob", "zanzibar")),
            Arc::new(FixedNonceGenerator("0a4f113b".to_string())),
        );
        let mut req = invite_to("sip:bob@biloxi.com");
        controller.add_authorization_headers(&mut req, &challenge_401()).unwrap();
        let err = controller.add_authorization_headers(&mut req, &challenge_401()).unwrap_err();
        assert!(matches!(err, Error::InvalidAuthCredentials));
    }

    #[test]
    fn proxy_challenge_after_server_challenge_is_unexpected() {
        let mut controller = AuthController::with_nonce_generator(
            Some(Credentials::new("bob", "zanzibar")),
            Arc::new(FixedNonceGenerator("0a4f113b".to_string())),
        );
        let mut req = invite_to("sip:bob@biloxi.com");
        controller.add_authorization_headers(&mut req, &challenge_401()).unwrap();

        let mut proxy_challenge = Response::new(StatusCode::PROXY_AUTH_REQUIRED, "Proxy Authentication Required");
        proxy_challenge
            .headers
            .add_header(r#"Proxy-Authenticate: Digest realm="atlanta.com", nonce="n2""#);
        let err = controller.add_authorization_headers(&mut req, &proxy_challenge).unwrap_err();
        assert!(matches!(err, Error::UnexpectedProxyAuth));
    }
}
