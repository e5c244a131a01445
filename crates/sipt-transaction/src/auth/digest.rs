//! RFC 2617 Digest response computation (spec.md §4.6), grounded on
//! `auth-core`'s `digest.rs` MD5 pipeline but trimmed to the MD5/MD5-sess
//! + auth/auth-int matrix this layer actually needs.

use std::sync::Arc;

use md5::{Digest, Md5};
use rand::rngs::OsRng;
use rand::RngCore;
use sipt_core::auth::{Algorithm, Challenge, Credentials, Qop};

fn hex_md5(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Produces the `cnonce` value a client attaches to a qop-protected
/// Authorization header. Split out as a trait so tests can supply a fixed
/// sequence instead of real randomness (SPEC_FULL.md "AMBIENT: TEST
/// TOOLING").
pub trait NonceGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// CSPRNG-backed generator used outside of tests.
pub struct DynamicNonceGenerator;

impl NonceGenerator for DynamicNonceGenerator {
    fn generate(&self) -> String {
        // 8 random bytes -> 16 hex characters (spec.md §4.6 "cnonce is 16
        // lowercase hex characters from a CSPRNG").
        let mut bytes = [0u8; 8];
        OsRng.fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Always returns the same value, for deterministic digest vector tests.
pub struct FixedNonceGenerator(pub String);

impl NonceGenerator for FixedNonceGenerator {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// The inputs needed to answer one Digest challenge for one request
/// (spec.md §4.6).
pub struct DigestRequest<'a> {
    pub method: &'a str,
    pub digest_uri: &'a str,
    pub body: &'a [u8],
    pub nonce_count: u32,
}

/// A computed Authorization/Proxy-Authorization parameter set, ready to be
/// rendered into a header value.
#[derive(Debug, Clone)]
pub struct DigestAnswer {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub algorithm: Algorithm,
    pub opaque: Option<String>,
    pub qop: Option<Qop>,
    pub cnonce: Option<String>,
    pub nonce_count: Option<u32>,
}

impl DigestAnswer {
    /// Renders this answer as the value half of an
    /// `Authorization: Digest ...` header line (spec.md §4.6).
    pub fn to_header_value(&self) -> String {
        let mut out = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            self.username, self.realm, self.nonce, self.uri, self.response
        );
        if self.algorithm != Algorithm::Md5 {
            out.push_str(&format!(", algorithm={}", self.algorithm));
        }
        if let Some(opaque) = &self.opaque {
            out.push_str(&format!(", opaque=\"{opaque}\""));
        }
        if let Some(qop) = self.qop {
            out.push_str(&format!(", qop={qop}"));
        }
        if let Some(cnonce) = &self.cnonce {
            out.push_str(&format!(", cnonce=\"{cnonce}\""));
        }
        if let Some(nc) = self.nonce_count {
            out.push_str(&format!(", nc={nc:08x}"));
        }
        out
    }
}

/// Computes Digest responses against a [`Challenge`]. Owns a
/// [`NonceGenerator`] for `cnonce` production; everything else is a pure
/// function of its inputs (spec.md §4.6).
pub struct AuthHandlerDigest {
    nonce_generator: Arc<dyn NonceGenerator>,
}

impl AuthHandlerDigest {
    pub fn new(nonce_generator: Arc<dyn NonceGenerator>) -> Self {
        AuthHandlerDigest { nonce_generator }
    }

    pub fn with_dynamic_nonces() -> Self {
        AuthHandlerDigest::new(Arc::new(DynamicNonceGenerator))
    }

    /// Answers `challenge` for `credentials`, producing the
    /// Authorization-header parameter set (spec.md §4.6).
    ///
    /// A1 is `username:realm:password` for `MD5`, or that hashed once more
    /// with `:nonce:cnonce` for `MD5-sess`. A2 is `method:uri`, or that
    /// plus `:H(body)` when `qop=auth-int` is selected.
    pub fn answer(&self, challenge: &Challenge, credentials: &Credentials, request: &DigestRequest<'_>) -> DigestAnswer {
        let algorithm = challenge.algorithm();
        let qop = challenge.qop_options().into_iter().next();
        let nonce = challenge.nonce().unwrap_or_default().to_string();
        let cnonce = qop
            .is_some()
            .then(|| self.nonce_generator.generate());

        let ha1_base = hex_md5(&format!("{}:{}:{}", credentials.username, challenge.realm, credentials.password));
        let ha1 = match algorithm {
            Algorithm::Md5 => ha1_base,
            Algorithm::Md5Sess => {
                let cnonce = cnonce.as_deref().unwrap_or_default();
                hex_md5(&format!("{ha1_base}:{nonce}:{cnonce}"))
            }
        };

        let ha2 = match qop {
            Some(Qop::AuthInt) => {
                let body_hash = hex_md5(&String::from_utf8_lossy(request.body));
                hex_md5(&format!("{}:{}:{}", request.method, request.digest_uri, body_hash))
            }
            _ => hex_md5(&format!("{}:{}", request.method, request.digest_uri)),
        };

        let response = match qop {
            Some(qop) => {
                let nc = format!("{:08x}", request.nonce_count);
                let cnonce = cnonce.as_deref().unwrap_or_default();
                hex_md5(&format!("{ha1}:{nonce}:{nc}:{cnonce}:{qop}:{ha2}"))
            }
            None => hex_md5(&format!("{ha1}:{nonce}:{ha2}")),
        };

        DigestAnswer {
            username: credentials.username.clone(),
            realm: challenge.realm.clone(),
            nonce,
            uri: request.digest_uri.to_string(),
            response,
            algorithm,
            opaque: challenge.opaque().map(str::to_string),
            qop,
            cnonce,
            nonce_count: qop.is_some().then_some(request.nonce_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc2617_challenge() -> Challenge {
        Challenge::parse(r#"Digest realm="testrealm@host.com", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#).unwrap()
    }

    #[test]
    fn md5_no_qop_matches_rfc2617_appendix() {
        let handler = AuthHandlerDigest::new(Arc::new(FixedNonceGenerator("0a4f113b".to_string())));
        let challenge = rfc2617_challenge();
        let creds = Credentials::new("Mufasa", "Circle Of Life");
        let request = DigestRequest {
            method: "GET",
            digest_uri: "/dir/index.html",
            body: b"",
            nonce_count: 1,
        };
        let answer = handler.answer(&challenge, &creds, &request);
        assert_eq!(answer.response, "670fd8c2df070c60b045671b8b24ff02");
    }

    #[test]
    fn qop_auth_uses_cnonce_and_nonce_count() {
        let challenge = Challenge::parse(r#"Digest realm="atlanta.com", nonce="84a4cc6f3082121f32b42a2187831a9e", qop="auth""#).unwrap();
        let handler = AuthHandlerDigest::new(Arc::new(FixedNonceGenerator("0a4f113b".to_string())));
        let creds = Credentials::new("bob", "zanzibar");
        let request = DigestRequest {
            method: "INVITE",
            digest_uri: "sip:bob@biloxi.com",
            body: b"",
            nonce_count: 1,
        };
        let answer = handler.answer(&challenge, &creds, &request);
        assert_eq!(answer.cnonce.as_deref(), Some("0a4f113b"));
        assert_eq!(answer.nonce_count, Some(1));
        assert!(answer.to_header_value().contains("qop=auth"));
    }

    #[test]
    fn md5_sess_hashes_a1_twice() {
        let challenge = Challenge::parse(r#"Digest realm="r", nonce="n1", algorithm=MD5-sess"#).unwrap();
        let handler = AuthHandlerDigest::new(Arc::new(FixedNonceGenerator("c1".to_string())));
        let creds = Credentials::new("alice", "secret");
        let request = DigestRequest {
            method: "REGISTER",
            digest_uri: "sip:registrar.atlanta.com",
            body: b"",
            nonce_count: 1,
        };
        let answer = handler.answer(&challenge, &creds, &request);
        assert_eq!(answer.algorithm, Algorithm::Md5Sess);
        assert!(!answer.response.is_empty());
    }
}
