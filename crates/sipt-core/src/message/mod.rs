pub mod headers;

use crate::numeric::{parse_content_length, parse_saturating_u32};
use crate::types::{HttpDate, Method, StatusCode, Uri, ViaEntry};

pub use headers::Headers;

/// A SIP request. `sip_version` is fixed at 2.0 per spec.md §3 and is not
/// stored as a field — callers that need it read `Message::SIP_VERSION`.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub request_uri: Uri,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// A SIP response. `reason` may be empty (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub reason: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// The tagged Request/Response variant spec.md §3 describes.
#[derive(Debug, Clone)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub const SIP_VERSION: (u8, u8) = (2, 0);

    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Message::Request(r) => Some(r),
            Message::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Message::Response(r) => Some(r),
            Message::Request(_) => None,
        }
    }

    pub fn headers(&self) -> &Headers {
        match self {
            Message::Request(r) => &r.headers,
            Message::Response(r) => &r.headers,
        }
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        match self {
            Message::Request(r) => &mut r.headers,
            Message::Response(r) => &mut r.headers,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            Message::Request(r) => &r.body,
            Message::Response(r) => &r.body,
        }
    }

    /// The topmost Via's `branch=` parameter, used to derive the
    /// transaction key (spec.md §3/§4.5).
    pub fn branch(&self) -> Option<String> {
        self.enumerate_via().into_iter().next()?.branch().map(str::to_string)
    }

    /// `(sequence, method)` from the CSeq header. For responses this is
    /// the only source of "method" since responses carry none of their
    /// own (spec.md §3).
    pub fn cseq(&self) -> Option<(u32, Method)> {
        let value = self.headers().get_normalized("CSeq").ok().flatten()?;
        let (seq, method) = value.split_once(' ')?;
        let seq: u32 = seq.trim().parse().ok()?;
        let method: Method = method.trim().parse().ok()?;
        Some((seq, method))
    }

    pub fn content_length(&self) -> Option<i64> {
        let value = self.headers().get_normalized("Content-Length").ok().flatten()?;
        parse_content_length(&value)
    }

    pub fn expires(&self) -> Option<u32> {
        let value = self.headers().get_normalized("Expires").ok().flatten()?;
        parse_saturating_u32(&value)
    }

    pub fn min_expires(&self) -> Option<u32> {
        let value = self.headers().get_normalized("Min-Expires").ok().flatten()?;
        parse_saturating_u32(&value)
    }

    fn address_header(&self, name: &str) -> Option<(Option<String>, String, Vec<(String, Option<String>)>)> {
        let value = self.headers().get_normalized(name).ok().flatten()?;
        Some(headers::parse_address_value(&value))
    }

    pub fn from(&self) -> Option<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.address_header("From")
    }

    pub fn to(&self) -> Option<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.address_header("To")
    }

    pub fn reply_to(&self) -> Option<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.address_header("Reply-To")
    }

    fn enumerate_address(&self, name: &str) -> Vec<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.headers()
            .enumerate_header(name)
            .iter()
            .map(|v| headers::parse_address_value(v))
            .collect()
    }

    pub fn enumerate_contact(&self) -> Vec<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.enumerate_address("Contact")
    }

    pub fn enumerate_route(&self) -> Vec<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.enumerate_address("Route")
    }

    pub fn enumerate_record_route(&self) -> Vec<(Option<String>, String, Vec<(String, Option<String>)>)> {
        self.enumerate_address("Record-Route")
    }

    pub fn enumerate_via(&self) -> Vec<ViaEntry> {
        self.headers()
            .enumerate_header("Via")
            .iter()
            .filter_map(|v| ViaEntry::parse(v))
            .collect()
    }

    pub fn get_time_valued_header(&self, name: &str) -> Option<HttpDate> {
        let value = self.headers().enumerate_header(name).into_iter().next()?;
        HttpDate::parse(&value)
    }

    /// Replaces every header present in `other` that also exists in
    /// `self`, with the CSeq special case: when `self` is a request, the
    /// sequence number comes from `other` but the method is preserved from
    /// `self` (spec.md §4.1 `update`).
    pub fn update(&mut self, other: &Message) {
        let mut adjusted = other.headers().clone();
        if self.is_request() {
            if let (Some((other_seq, _)), Some((_, self_method))) = (other.cseq(), self.cseq()) {
                adjusted.remove_header("CSeq");
                adjusted.push_raw("CSeq", format!("{} {}", other_seq, self_method));
            }
        }
        self.headers_mut().update(&adjusted);
    }

    /// Emits the normalized wire form: start-line, then headers via
    /// `Headers::to_wire_string`, then the body verbatim (spec.md §6).
    pub fn to_wire_string(&self) -> String {
        let mut out = match self {
            Message::Request(r) => format!(
                "{} {} SIP/{}.{}\r\n",
                r.method,
                r.request_uri,
                Self::SIP_VERSION.0,
                Self::SIP_VERSION.1
            ),
            Message::Response(r) => format!(
                "SIP/{}.{} {} {}\r\n",
                Self::SIP_VERSION.0,
                Self::SIP_VERSION.1,
                r.status,
                r.reason
            ),
        };
        out.push_str(&self.headers().to_wire_string());
        if !self.body().is_empty() {
            out.push_str(&String::from_utf8_lossy(self.body()));
        }
        out
    }
}

impl Request {
    pub fn new(method: Method, request_uri: Uri) -> Self {
        Request {
            method,
            request_uri,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Builds a response sharing this request's dialog-identifying
    /// headers (Via, From, To, Call-ID, CSeq), per `sippet`'s
    /// `Request::CreateResponse`.
    pub fn create_response(&self, status: StatusCode, reason: impl Into<String>) -> Response {
        let mut headers = Headers::new();
        for (name, value) in self.headers.enumerate_header_lines() {
            if matches!(
                name.to_ascii_lowercase().as_str(),
                "via" | "from" | "to" | "call-id" | "cseq"
            ) {
                headers.push_raw(name, value);
            }
        }
        Response {
            status,
            reason: reason.into(),
            headers,
            body: Vec::new(),
        }
    }

    /// Builds the ACK sent directly by a client transaction on a
    /// non-2xx final response, per spec.md §4.3: Via/From/Call-ID and the
    /// CSeq sequence number are reused, the CSeq method becomes ACK, and
    /// `to_tag` (from the response's To) is attached.
    pub fn create_ack(&self, to_tag: Option<&str>) -> Request {
        let mut ack = Request::new(Method::Ack, self.request_uri.clone());
        for (name, value) in self.headers.enumerate_header_lines() {
            match name.to_ascii_lowercase().as_str() {
                "via" | "from" | "call-id" | "route" => ack.headers.push_raw(name, value),
                "cseq" => {
                    if let Some((seq, _)) = value.split_once(' ') {
                        ack.headers.push_raw("CSeq", format!("{} ACK", seq.trim()));
                    }
                }
                "to" => {
                    let value = match to_tag {
                        Some(tag) if !value.contains("tag=") => format!("{};tag={}", value, tag),
                        _ => value.to_string(),
                    };
                    ack.headers.push_raw("To", value);
                }
                _ => {}
            }
        }
        ack
    }
}

impl Response {
    pub fn new(status: StatusCode, reason: impl Into<String>) -> Self {
        Response {
            status,
            reason: reason.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_invite() -> Request {
        let mut req = Request::new(Method::Invite, "sip:bob@biloxi.com".parse().unwrap());
        req.headers
            .add_header("Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds");
        req.headers
            .add_header("From: Alice <sip:alice@atlanta.com>;tag=1928301774");
        req.headers.add_header("To: Bob <sip:bob@biloxi.com>");
        req.headers.add_header("Call-ID: a84b4c76e66710@pc33.atlanta.com");
        req.headers.add_header("CSeq: 314159 INVITE");
        req
    }

    #[test]
    fn branch_reads_topmost_via() {
        let req = Message::Request(sample_invite());
        assert_eq!(req.branch().as_deref(), Some("z9hG4bK776asdhds"));
    }

    #[test]
    fn cseq_parses_sequence_and_method() {
        let req = Message::Request(sample_invite());
        assert_eq!(req.cseq(), Some((314159, Method::Invite)));
    }

    #[test]
    fn create_response_copies_dialog_headers() {
        let req = sample_invite();
        let resp = req.create_response(StatusCode::RINGING, "Ringing");
        assert_eq!(resp.headers.header_count("Via"), 1);
        assert_eq!(resp.headers.header_count("From"), 1);
        assert_eq!(resp.status, StatusCode::RINGING);
    }

    #[test]
    fn create_ack_uses_invite_cseq_number_with_ack_method() {
        let req = sample_invite();
        let ack = req.create_ack(Some("9876543"));
        let ack_msg = Message::Request(ack);
        assert_eq!(ack_msg.cseq(), Some((314159, Method::Ack)));
        let (_, to_uri, params) = ack_msg.to().unwrap();
        assert_eq!(to_uri, "sip:bob@biloxi.com");
        assert!(params.iter().any(|(k, v)| k == "tag" && v.as_deref() == Some("9876543")));
    }

    #[test]
    fn update_preserves_request_method_on_cseq() {
        let mut resp_target = Message::Request(sample_invite());
        let mut other = Message::Request(sample_invite());
        other.headers_mut().remove_header("CSeq");
        other.headers_mut().push_raw("CSeq", "1 CANCEL");
        resp_target.update(&other);
        assert_eq!(resp_target.cseq(), Some((1, Method::Invite)));
    }
}
