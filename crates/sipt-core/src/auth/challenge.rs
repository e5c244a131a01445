use crate::auth::params::{Algorithm, Qop};
use crate::message::headers::split_top_level;

/// A parsed `WWW-Authenticate`/`Proxy-Authenticate` challenge (spec.md §3).
///
/// `scheme` is compared case-insensitively throughout this crate; `realm` is
/// kept as the UTF-8 string the parser produced (see DESIGN.md's Open
/// Question resolution on realm encoding). `params` preserves every
/// scheme-specific parameter verbatim (quotes stripped) for schemes this
/// crate does not special-case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub scheme: String,
    pub realm: String,
    pub params: Vec<(String, String)>,
}

impl Challenge {
    pub fn scheme_eq(&self, scheme: &str) -> bool {
        self.scheme.eq_ignore_ascii_case(scheme)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn nonce(&self) -> Option<&str> {
        self.param("nonce")
    }

    pub fn opaque(&self) -> Option<&str> {
        self.param("opaque")
    }

    pub fn domain(&self) -> Vec<String> {
        self.param("domain")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn stale(&self) -> bool {
        self.param("stale")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.param("algorithm")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// The `qop` options the challenge offers, in the order listed.
    pub fn qop_options(&self) -> Vec<Qop> {
        self.param("qop")
            .map(|v| v.split(',').filter_map(|q| q.trim().parse().ok()).collect())
            .unwrap_or_default()
    }

    /// Parses one physical `WWW-Authenticate`/`Proxy-Authenticate` header
    /// value: `Scheme param=value, param="value", ...`.
    pub fn parse(raw: &str) -> Option<Challenge> {
        let raw = raw.trim();
        let (scheme, rest) = raw.split_once(char::is_whitespace)?;
        let scheme = scheme.to_string();
        let mut realm = String::new();
        let mut params = Vec::new();
        for seg in split_top_level(rest.trim(), ',') {
            let seg = seg.trim();
            if seg.is_empty() {
                continue;
            }
            let Some((k, v)) = seg.split_once('=') else {
                params.push((seg.to_string(), String::new()));
                continue;
            };
            let k = k.trim().to_string();
            let v = v.trim().trim_matches('"').to_string();
            if k.eq_ignore_ascii_case("realm") {
                realm = v.clone();
            }
            params.push((k, v));
        }
        Some(Challenge { scheme, realm, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_digest_challenge_with_qop() {
        let c = Challenge::parse(
            r#"Digest realm="example.com", nonce="abc", qop="auth", algorithm=MD5"#,
        )
        .unwrap();
        assert!(c.scheme_eq("digest"));
        assert_eq!(c.realm, "example.com");
        assert_eq!(c.nonce(), Some("abc"));
        assert_eq!(c.qop_options(), vec![Qop::Auth]);
        assert_eq!(c.algorithm(), Algorithm::Md5);
    }

    #[test]
    fn stale_flag_parses() {
        let c = Challenge::parse(r#"Digest realm="x", nonce="n2", stale=true"#).unwrap();
        assert!(c.stale());
    }
}
