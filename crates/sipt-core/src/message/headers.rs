use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::types::via::ViaEntry;

/// IANA SIP compact-form table (spec.md §4.1).
const COMPACT_TABLE: &[(char, &str)] = &[
    ('a', "Accept-Contact"),
    ('b', "Referred-By"),
    ('c', "Content-Type"),
    ('e', "Content-Encoding"),
    ('f', "From"),
    ('i', "Call-ID"),
    ('k', "Supported"),
    ('l', "Content-Length"),
    ('m', "Contact"),
    ('o', "Event"),
    ('r', "Refer-To"),
    ('s', "Subject"),
    ('t', "To"),
    ('u', "Allow-Events"),
    ('v', "Via"),
];

/// Headers whose repeated instances must each stay on their own line;
/// commas inside the value are literal (spec.md §3, §4.1 coalescing table).
const NON_COALESCING: &[&str] = &[
    "date",
    "retry-after",
    "authentication-info",
    "authorization",
    "proxy-authorization",
    "www-authenticate",
    "proxy-authenticate",
];

/// Headers re-parsed and re-emitted as `"display" <addr-spec>;params`
/// (spec.md §4.1).
const CONTACT_LIKE: &[&str] = &[
    "from",
    "to",
    "reply-to",
    "contact",
    "route",
    "record-route",
    "refer-to",
    "referred-by",
];

fn expand_compact(name: &str) -> String {
    if name.chars().count() == 1 {
        if let Some(c) = name.chars().next() {
            let lower = c.to_ascii_lowercase();
            if let Some((_, long)) = COMPACT_TABLE.iter().find(|(k, _)| *k == lower) {
                return long.to_string();
            }
        }
    }
    name.to_string()
}

fn is_non_coalescing(name: &str) -> bool {
    NON_COALESCING.contains(&name.to_ascii_lowercase().as_str())
}

fn is_contact_like(name: &str) -> bool {
    CONTACT_LIKE.contains(&name.to_ascii_lowercase().as_str())
}

/// Splits `s` on top-level occurrences of `delim`, treating text inside
/// double quotes as opaque (spec.md §4.1: "respecting quoted strings").
pub(crate) fn split_top_level(s: &str, delim: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c == delim && !in_quotes => {
                out.push(current.trim().to_string());
                current = String::new();
            }
            c => current.push(c),
        }
    }
    out.push(current.trim().to_string());
    out
}

/// Collapses runs of internal whitespace to a single space, except inside
/// double-quoted spans (spec.md §4.1 header-value normalization).
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_quotes = false;
    let mut last_was_space = false;
    for c in s.trim().chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            out.push(c);
            last_was_space = false;
            continue;
        }
        if !in_quotes && c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

/// One parsed address-like value: `"display"? <addr-spec>;params`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Address {
    display: Option<String>,
    addr_spec: String,
    params: Vec<(String, Option<String>)>,
}

fn parse_params(rest: &str) -> Vec<(String, Option<String>)> {
    let mut params = Vec::new();
    for seg in split_top_level(rest, ';') {
        let seg = seg.trim();
        if seg.is_empty() {
            continue;
        }
        match seg.split_once('=') {
            Some((k, v)) => params.push((k.trim().to_string(), Some(v.trim().to_string()))),
            None => params.push((seg.to_string(), None)),
        }
    }
    params
}

fn parse_address(value: &str) -> Address {
    let value = value.trim();
    if let Some(rest) = value.strip_prefix('"') {
        // Quoted display name.
        if let Some(end) = find_unescaped_quote(rest) {
            let display = rest[..end].to_string();
            let after = rest[end + 1..].trim_start();
            return parse_angle_addr(after, Some(display));
        }
    }
    if let Some(lt) = value.find('<') {
        let display = value[..lt].trim();
        let display = if display.is_empty() {
            None
        } else {
            Some(display.to_string())
        };
        return parse_angle_addr(&value[lt..], display);
    }
    // Bare addr-spec, no angle brackets: addr-spec runs up to the first ';'.
    let parts = split_top_level(value, ';');
    let addr_spec = parts.first().cloned().unwrap_or_default();
    let params = if parts.len() > 1 {
        parse_params(&parts[1..].join(";"))
    } else {
        Vec::new()
    };
    Address {
        display: None,
        addr_spec,
        params,
    }
}

fn find_unescaped_quote(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == b'"' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_angle_addr(s: &str, display: Option<String>) -> Address {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('<') {
        if let Some(end) = rest.find('>') {
            let addr_spec = rest[..end].to_string();
            let after = rest[end + 1..].trim_start_matches(';').trim();
            let params = parse_params(after);
            return Address {
                display,
                addr_spec,
                params,
            };
        }
    }
    // Malformed angle-addr: treat whole remainder as the addr-spec.
    Address {
        display,
        addr_spec: s.to_string(),
        params: Vec::new(),
    }
}

/// Parses a single address-like header value into `(display, addr_spec,
/// params)`, used by `Message::from`/`to`/`reply_to`/`enumerate_contact`
/// and friends (spec.md §4.1 structured accessors).
pub fn parse_address_value(value: &str) -> (Option<String>, String, Vec<(String, Option<String>)>) {
    let addr = parse_address(value);
    (addr.display, addr.addr_spec, addr.params)
}

impl Address {
    fn to_canonical(&self) -> String {
        let mut out = match &self.display {
            Some(d) => format!("\"{}\" <{}>", d, self.addr_spec),
            None => format!("<{}>", self.addr_spec),
        };
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

fn normalize_value(name: &str, raw_value: &str) -> String {
    let collapsed = collapse_whitespace(raw_value);
    if name.eq_ignore_ascii_case("via") {
        return split_top_level(&collapsed, ',')
            .iter()
            .map(|v| {
                ViaEntry::parse(v)
                    .map(|e| e.to_canonical())
                    .unwrap_or_else(|| v.clone())
            })
            .collect::<Vec<_>>()
            .join(", ");
    }
    if is_contact_like(name) && !is_non_coalescing(name) {
        return split_top_level(&collapsed, ',')
            .iter()
            .map(|v| parse_address(v).to_canonical())
            .collect::<Vec<_>>()
            .join(", ");
    }
    collapsed
}

/// The ordered header store described in spec.md §3/§4.1/§9: a list of
/// `(name, value)` pairs, preserving insertion order and original header
/// name case, with a side index used for case-insensitive lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.enumerate_header(name).len()
    }

    pub fn enumerate_header_lines(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Coalescing headers are split on top-level commas; non-coalescing
    /// headers yield one entry per physical line unchanged (spec.md §4.1).
    pub fn enumerate_header(&self, name: &str) -> Vec<String> {
        let non_coalescing = is_non_coalescing(name);
        let mut out = Vec::new();
        for (n, v) in &self.entries {
            if !n.eq_ignore_ascii_case(name) {
                continue;
            }
            if non_coalescing {
                out.push(v.clone());
            } else {
                out.extend(split_top_level(v, ','));
            }
        }
        out
    }

    /// Refuses non-coalescing headers (spec.md §4.1: "must not be used on
    /// non-coalescing headers").
    pub fn get_normalized(&self, name: &str) -> Result<Option<String>> {
        if is_non_coalescing(name) {
            return Err(Error::NonCoalescingHeader(name.to_string()));
        }
        let values = self.enumerate_header(name);
        if values.is_empty() {
            Ok(None)
        } else {
            Ok(Some(values.join(", ")))
        }
    }

    pub fn has_header_value(&self, name: &str, value: &str) -> bool {
        self.enumerate_header(name)
            .iter()
            .any(|v| v.eq_ignore_ascii_case(value))
    }

    /// Parses and appends one raw header line. Folded continuation lines
    /// (leading LWSP) are merged into the previous header's value; a
    /// continuation with no preceding header, or a line with no colon, is
    /// malformed and dropped silently (spec.md §4.1 parse-failure mode).
    /// Returns whether the line was kept.
    pub fn add_header(&mut self, raw_line: &str) -> bool {
        if raw_line.starts_with(' ') || raw_line.starts_with('\t') {
            return match self.entries.last_mut() {
                Some((_, value)) => {
                    let appended = format!("{} {}", value, raw_line.trim());
                    *value = collapse_whitespace(&appended);
                    true
                }
                None => {
                    tracing::debug!(line = raw_line, "dropping orphan folded continuation");
                    false
                }
            };
        }

        let Some((name, value)) = raw_line.split_once(':') else {
            tracing::debug!(line = raw_line, "dropping header line with no colon");
            return false;
        };
        let name = name.trim();
        if name.is_empty() || name.starts_with(':') || name.ends_with(':') {
            tracing::debug!(line = raw_line, "dropping header line with empty name");
            return false;
        }
        let canonical_name = expand_compact(name);
        let normalized = normalize_value(&canonical_name, value);
        self.entries.push((canonical_name, normalized));
        true
    }

    /// Appends an already-normalized `(name, value)` pair directly, for
    /// programmatic header construction that should not be re-parsed.
    pub fn push_raw(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces the value of the topmost `Via` header line, or inserts one
    /// at the front of the store if none is present yet. Used by
    /// `ClientTransaction::start` to stamp the connection's chosen
    /// transport/host/port/branch onto an otherwise Via-less request
    /// (spec.md §4.3).
    pub fn set_topmost_via(&mut self, value: String) {
        if let Some(pos) = self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case("via")) {
            self.entries[pos].1 = value;
        } else {
            self.entries.insert(0, ("Via".to_string(), value));
        }
    }

    pub fn remove_header(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn remove_headers(&mut self, names: &[&str]) {
        let set: HashSet<String> = names.iter().map(|n| n.to_ascii_lowercase()).collect();
        self.entries
            .retain(|(n, _)| !set.contains(&n.to_ascii_lowercase()));
    }

    /// Removes only the physical line(s) of `name` whose value equals
    /// `exact_value` (spec.md §4.1).
    pub fn remove_header_line(&mut self, name: &str, exact_value: &str) {
        self.entries
            .retain(|(n, v)| !(n.eq_ignore_ascii_case(name) && v == exact_value));
    }

    /// For every header name present in `other` that also exists in
    /// `self`, replaces all of `self`'s occurrences (collapsed to the
    /// position of the first) with `other`'s occurrences. Names in `other`
    /// absent from `self` are ignored (spec.md §4.1 `update`).
    pub fn update(&mut self, other: &Headers) {
        let mut replaced: HashSet<String> = HashSet::new();
        let mut result = Vec::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let key = name.to_ascii_lowercase();
            let other_has = other.entries.iter().any(|(n, _)| n.to_ascii_lowercase() == key);
            if other_has {
                if replaced.insert(key.clone()) {
                    for (on, ov) in other
                        .entries
                        .iter()
                        .filter(|(n, _)| n.to_ascii_lowercase() == key)
                    {
                        result.push((on.clone(), ov.clone()));
                    }
                }
            } else {
                result.push((name.clone(), value.clone()));
            }
        }
        self.entries = result;
    }

    /// Drops any existing `received=` parameter on the topmost Via and
    /// appends `;received=ip` (spec.md §4.1).
    pub fn set_via_received(&mut self, ip: &str) {
        if let Some((_, value)) = self.entries.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case("via")) {
            let first_comma = split_top_level(value, ',');
            if let Some(first) = first_comma.first() {
                if let Some(mut entry) = ViaEntry::parse(first) {
                    entry.params.remove("received");
                    entry.params.insert("received".to_string(), Some(ip.to_string()));
                    let mut rebuilt = vec![entry.to_canonical()];
                    rebuilt.extend(first_comma.into_iter().skip(1));
                    *value = rebuilt.join(", ");
                }
            }
        }
    }

    /// Emits the normalized form with CRLF line endings and a trailing
    /// blank line (spec.md §4.1/§6).
    pub fn to_wire_string(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}
