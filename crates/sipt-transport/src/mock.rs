//! An in-memory transport test double (SPEC_FULL.md §6), grounded on the
//! teacher's own test-only transports (`UdpTransport::default()`'s "dummy"
//! constructor in `sip-transport`, and the `transaction_test_utils` mock
//! transport pattern in `rvoip-transaction-core`'s test suite).

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sipt_core::Message;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::transport::{Connection, Transport, TransportEvent, TransportKind};

/// Records every message handed to [`MockConnection::send_message`] so
/// tests can assert on wire-level output (branch stamping, ACK shape, ...).
#[derive(Default)]
struct Sent {
    queue: Mutex<VecDeque<Message>>,
}

/// A [`Connection`] that appends to a shared, test-visible queue instead of
/// writing to a socket.
#[derive(Clone)]
pub struct MockConnection {
    kind: TransportKind,
    local: (String, u16),
    destination: (String, u16),
    sent: Arc<Sent>,
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MockConnection({} {}:{} -> {}:{})",
            self.kind.as_str(),
            self.local.0,
            self.local.1,
            self.destination.0,
            self.destination.1
        )
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn get_transport_protocol(&self) -> TransportKind {
        self.kind
    }

    fn get_destination(&self) -> (String, u16) {
        self.destination.clone()
    }

    fn get_local_sent_by(&self) -> (String, u16) {
        self.local.clone()
    }

    async fn send_message(&self, message: Message) -> Result<()> {
        self.sent.queue.lock().push_back(message);
        Ok(())
    }
}

/// An in-memory [`Transport`] that hands out [`MockConnection`]s and lets
/// tests both inspect everything sent and inject inbound
/// [`TransportEvent`]s as if they had arrived over the wire.
pub struct MockTransport {
    kind: TransportKind,
    local: (String, u16),
    sent: Arc<Sent>,
    events_tx: mpsc::Sender<TransportEvent>,
}

impl MockTransport {
    /// Builds a mock transport bound to `local` (e.g. `("10.0.0.1",
    /// 5062)`), returning the transport plus the receiver side of its
    /// inbound-event channel (wired into a `TransactionLayer` by tests).
    pub fn new(kind: TransportKind, local: (String, u16)) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::channel(128);
        (
            MockTransport {
                kind,
                local,
                sent: Arc::new(Sent::default()),
                events_tx,
            },
            events_rx,
        )
    }

    /// Pops the oldest message handed to any connection this transport
    /// produced, in send order.
    pub fn take_sent(&self) -> Option<Message> {
        self.sent.queue.lock().pop_front()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.queue.lock().len()
    }

    /// Delivers `message` to the transaction layer as if it had just
    /// arrived from `source`.
    pub async fn deliver(&self, message: Message, source: (String, u16)) {
        tracing::debug!(?source, "mock transport delivering inbound message");
        let _ = self
            .events_tx
            .send(TransportEvent::MessageReceived { message, source })
            .await;
    }

    pub async fn deliver_error(&self, key_hint: Option<String>, error: impl Into<String>) {
        let _ = self
            .events_tx
            .send(TransportEvent::Error {
                key_hint,
                error: error.into(),
            })
            .await;
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, uri: &sipt_core::Uri) -> Result<Arc<dyn Connection>> {
        let destination = (uri.host.clone(), uri.effective_port());
        Ok(Arc::new(MockConnection {
            kind: self.kind,
            local: self.local.clone(),
            destination,
            sent: self.sent.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_hands_out_a_connection_to_the_request_uri() {
        let (transport, _rx) = MockTransport::new(TransportKind::Udp, ("10.0.0.1".into(), 5062));
        let uri: sipt_core::Uri = "sip:bob@biloxi.com:5060".parse().unwrap();
        let conn = transport.connect(&uri).await.unwrap();
        assert_eq!(conn.get_destination(), ("biloxi.com".to_string(), 5060));
        assert_eq!(conn.get_transport_protocol(), TransportKind::Udp);
    }

    #[tokio::test]
    async fn sent_messages_are_queued_for_inspection() {
        let (transport, _rx) = MockTransport::new(TransportKind::Udp, ("10.0.0.1".into(), 5062));
        let uri: sipt_core::Uri = "sip:bob@biloxi.com".parse().unwrap();
        let conn = transport.connect(&uri).await.unwrap();
        let req = sipt_core::Request::new(sipt_core::Method::Register, uri);
        conn.send_message(sipt_core::Message::Request(req)).await.unwrap();
        assert_eq!(transport.sent_count(), 1);
        assert!(transport.take_sent().is_some());
    }
}
