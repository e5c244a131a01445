use std::collections::BTreeMap;

use crate::types::uri::parse_host_port;

/// One parsed Via entry: `SIP/2.0/transport host[:port];params`.
///
/// Returned by `Message::enumerate_via` per spec.md §4.1's structured
/// accessor list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViaEntry {
    pub transport: String,
    pub host: String,
    pub port: Option<u16>,
    pub params: BTreeMap<String, Option<String>>,
}

impl ViaEntry {
    /// The `host:port` pair this Via's transaction/registry keys are
    /// derived from, applying the scheme-default port when none is given
    /// (spec.md §4.1 Via parsing rule / §3 `sent-by`).
    pub fn sent_by(&self) -> String {
        let port = self
            .port
            .unwrap_or_else(|| crate::types::uri::Uri::default_port_for(&self.transport));
        format!("{}:{}", self.host, port)
    }

    pub fn branch(&self) -> Option<&str> {
        self.params.get("branch").and_then(|v| v.as_deref())
    }

    pub fn received(&self) -> Option<&str> {
        self.params.get("received").and_then(|v| v.as_deref())
    }

    /// Parses the value of one physical Via header line/segment, e.g.
    /// `SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK-xyz;rport`.
    pub fn parse(value: &str) -> Option<ViaEntry> {
        let value = value.trim();
        let (sent_protocol, rest) = value.split_once(char::is_whitespace)?;
        let mut proto_parts = sent_protocol.splitn(3, '/');
        let _name = proto_parts.next()?; // "SIP"
        let _version = proto_parts.next()?; // "2.0"
        let transport = proto_parts.next()?.to_ascii_uppercase();

        let mut segments = rest.trim().split(';');
        let hostport = segments.next()?.trim();
        let (host, port) = parse_host_port(hostport).ok()?;

        let mut params = BTreeMap::new();
        for seg in segments {
            let seg = seg.trim();
            if seg.is_empty() {
                continue;
            }
            match seg.split_once('=') {
                Some((k, v)) => {
                    params.insert(k.to_string(), Some(v.trim_matches('"').to_string()));
                }
                None => {
                    params.insert(seg.to_string(), None);
                }
            }
        }

        Some(ViaEntry {
            transport,
            host,
            port,
            params,
        })
    }

    /// Re-emits this entry in canonical form, per spec.md §4.1's Via
    /// normalization rule: `SIP/2.0/TRANSPORT host[:port];params`.
    pub fn to_canonical(&self) -> String {
        let mut out = format!("SIP/2.0/{} {}", self.transport, self.host);
        if let Some(port) = self.port {
            out.push(':');
            out.push_str(&port.to_string());
        }
        for (k, v) in &self.params {
            out.push(';');
            out.push_str(k);
            if let Some(v) = v {
                out.push('=');
                out.push_str(v);
            }
        }
        out
    }
}
