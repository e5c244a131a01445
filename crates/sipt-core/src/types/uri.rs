use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A minimal `sip:`/`sips:` URI: enough to support request-URI parsing,
/// Via default-port rules (spec.md §4.1) and digest's `uri=` field. Not a
/// full RFC 3261 URI grammar — absoluteURI, `tel:`, and SDP-flavored URIs
/// are out of scope (spec.md §1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uri {
    pub secure: bool,
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub params: BTreeMap<String, Option<String>>,
}

impl Uri {
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "sips"
        } else {
            "sip"
        }
    }

    /// Default port per the transport (UDP/TCP: 5060, TLS: 5061), used for
    /// Via `sent-by` comparisons and origin derivation. Returns 0 for a
    /// transport this layer does not recognize, matching spec.md §4.1.
    pub fn default_port_for(transport: &str) -> u16 {
        match transport.to_ascii_uppercase().as_str() {
            "UDP" | "TCP" => 5060,
            "TLS" => 5061,
            _ => 0,
        }
    }

    /// The effective port: explicit if given, else the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(if self.secure { 5061 } else { 5060 })
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.scheme())?;
        if let Some(user) = &self.user {
            write!(f, "{}@", user)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        for (k, v) in &self.params {
            match v {
                Some(v) => write!(f, ";{}={}", k, v)?,
                None => write!(f, ";{}", k)?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Uri {
    type Err = Error;

    /// Parses `sip:`/`sips:` URIs of the shape
    /// `sip[s]:[user@]host[:port][;param=value]*`. IPv6 hosts are accepted
    /// in bracketed form and the brackets are stripped (spec.md §4.1 Via
    /// parsing rule, applied here too since request-URIs share the same
    /// host grammar).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidUri(s.to_string()))?;
        let secure = match scheme.to_ascii_lowercase().as_str() {
            "sip" => false,
            "sips" => true,
            _ => return Err(Error::InvalidUri(s.to_string())),
        };

        let mut parts = rest.split(';');
        let userhost = parts
            .next()
            .ok_or_else(|| Error::InvalidUri(s.to_string()))?;

        let mut params = BTreeMap::new();
        for param in parts {
            if param.is_empty() {
                continue;
            }
            match param.split_once('=') {
                Some((k, v)) => {
                    params.insert(k.to_string(), Some(v.to_string()));
                }
                None => {
                    params.insert(param.to_string(), None);
                }
            }
        }

        let (user, hostport) = match userhost.rsplit_once('@') {
            Some((user, hostport)) => (Some(user.to_string()), hostport),
            None => (None, userhost),
        };

        if hostport.is_empty() {
            return Err(Error::InvalidUri(s.to_string()));
        }

        let (host, port) = parse_host_port(hostport)?;

        Ok(Uri {
            secure,
            user,
            host,
            port,
            params,
        })
    }
}

/// Shared host[:port] parsing for request-URIs and Via `sent-by`. Strips
/// IPv6 brackets per spec.md §4.1.
pub(crate) fn parse_host_port(hostport: &str) -> Result<(String, Option<u16>), Error> {
    if let Some(rest) = hostport.strip_prefix('[') {
        // Bracketed IPv6 literal, optionally followed by :port.
        let (addr, after) = rest
            .split_once(']')
            .ok_or_else(|| Error::InvalidUri(hostport.to_string()))?;
        let port = match after.strip_prefix(':') {
            Some(p) if !p.is_empty() => {
                Some(p.parse::<u16>().map_err(|_| Error::InvalidUri(hostport.to_string()))?)
            }
            Some(_) => None,
            None => None,
        };
        Ok((addr.to_string(), port))
    } else if let Some((host, port)) = hostport.rsplit_once(':') {
        // Guard against an unbracketed IPv6 literal with multiple colons.
        if host.contains(':') {
            Ok((hostport.to_string(), None))
        } else {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::InvalidUri(hostport.to_string()))?;
            Ok((host.to_string(), Some(port)))
        }
    } else {
        Ok((hostport.to_string(), None))
    }
}
