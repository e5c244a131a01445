use std::fmt;

use sipt_core::{Message, Method};

/// A transaction key string, one of the two forms spec.md §3 defines:
///
/// - Client: `"C->" + branch + ":" + method`
/// - Server: `"S->" + branch + ":" + method + ":" + sent-by`
///
/// `sent-by` is the `host:port` of the topmost Via. Grounded on
/// `sippet/client_transaction.cc`'s branch/key handling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionKey(String);

impl TransactionKey {
    pub fn client(branch: &str, method: &Method) -> TransactionKey {
        TransactionKey(format!("C->{branch}:{method}"))
    }

    pub fn server(branch: &str, method: &Method, sent_by: &str) -> TransactionKey {
        TransactionKey(format!("S->{branch}:{method}:{sent_by}"))
    }

    pub fn is_client(&self) -> bool {
        self.0.starts_with("C->")
    }

    pub fn is_server(&self) -> bool {
        self.0.starts_with("S->")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wraps an already-known key string verbatim, for transport
    /// implementations that only have a key's wire form to report a
    /// delivery failure against (spec.md §4.3/§4.4 transport error
    /// handling).
    pub fn from_raw(s: impl Into<String>) -> TransactionKey {
        TransactionKey(s.into())
    }

    /// The client-side key for `message`: an outgoing request keys off its
    /// own method, an incoming response keys off the CSeq method (spec.md
    /// §3: "responses do not have a method of their own").
    pub fn for_client(message: &Message) -> Option<TransactionKey> {
        let branch = message.branch()?;
        let method = match message {
            Message::Request(r) => r.method.clone(),
            Message::Response(_) => message.cseq()?.1,
        };
        Some(TransactionKey::client(&branch, &method))
    }

    /// The server-side key for an inbound request: branch + method +
    /// sent-by of the topmost Via (spec.md §3, §4.5).
    pub fn for_server_request(message: &Message) -> Option<TransactionKey> {
        let req = message.as_request()?;
        let branch = message.branch()?;
        let via = message.enumerate_via().into_iter().next()?;
        Some(TransactionKey::server(&branch, &req.method, &via.sent_by()))
    }

    /// The server-side key computed from an outbound response, using the
    /// CSeq method and the top Via's sent-by (spec.md §4.5 `send_response`).
    pub fn for_server_response(message: &Message) -> Option<TransactionKey> {
        let branch = message.branch()?;
        let (_, method) = message.cseq()?;
        let via = message.enumerate_via().into_iter().next()?;
        Some(TransactionKey::server(&branch, &method, &via.sent_by()))
    }

    /// The key of the INVITE server transaction an inbound non-2xx ACK
    /// belongs to: same branch and sent-by, but keyed under INVITE rather
    /// than ACK's own CSeq method (spec.md §4.4: "ACK for a non-2xx final
    /// response matches the original INVITE server transaction").
    pub fn for_server_ack(message: &Message) -> Option<TransactionKey> {
        let branch = message.branch()?;
        let via = message.enumerate_via().into_iter().next()?;
        Some(TransactionKey::server(&branch, &Method::Invite, &via.sent_by()))
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sipt_core::{Request, Response, StatusCode};

    fn invite_with_via(branch: &str) -> Request {
        let mut req = Request::new(Method::Invite, "sip:bob@biloxi.com".parse().unwrap());
        req.headers
            .add_header(&format!("Via: SIP/2.0/UDP pc33.atlanta.com;branch={branch}"));
        req.headers.add_header("CSeq: 1 INVITE");
        req
    }

    #[test]
    fn client_and_server_keys_match_for_the_same_request() {
        let req = invite_with_via("z9hG4bK776asdhds");
        let msg = Message::Request(req);
        let client_key = TransactionKey::for_client(&msg).unwrap();
        let server_key = TransactionKey::for_server_request(&msg).unwrap();
        assert_eq!(client_key.as_str(), "C->z9hG4bK776asdhds:INVITE");
        assert_eq!(
            server_key.as_str(),
            "S->z9hG4bK776asdhds:INVITE:pc33.atlanta.com:5060"
        );
    }

    #[test]
    fn response_client_key_uses_cseq_method() {
        let mut resp = Response::new(StatusCode::RINGING, "Ringing");
        resp.headers
            .add_header("Via: SIP/2.0/UDP pc33.atlanta.com;branch=z9hG4bK776asdhds");
        resp.headers.add_header("CSeq: 1 INVITE");
        let key = TransactionKey::for_client(&Message::Response(resp)).unwrap();
        assert_eq!(key.as_str(), "C->z9hG4bK776asdhds:INVITE");
    }
}
