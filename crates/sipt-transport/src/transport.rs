//! The transport boundary consumed by the transaction layer (spec.md §6).
//!
//! Real UDP/TCP/TLS socket handling is explicitly out of scope (spec.md
//! §1); this module only defines the trait seam plus the event type
//! transports push upward. Grounded on `sip-transport`'s `Transport`/
//! `TransportEvent` shape (`crates/sip-transport/src/transport/udp/mod.rs`),
//! adapted to the `connect`/`Connection` surface spec.md §6 describes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sipt_core::Message;

use crate::error::Result;

/// One of the five transport protocol tokens this layer round-trips
/// through Via (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Udp,
    Tcp,
    Tls,
    Ws,
    Wss,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
            TransportKind::Tls => "TLS",
            TransportKind::Ws => "WS",
            TransportKind::Wss => "WSS",
        }
    }

    /// Whether retransmission timers apply: only UDP is unreliable
    /// (spec.md §4.3 "Retransmission timer is armed only for unreliable
    /// (UDP) transports").
    pub fn is_reliable(self) -> bool {
        !matches!(self, TransportKind::Udp)
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bound connection to one destination, handed back by
/// `Transport::connect` (spec.md §6 `Connection`).
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    fn get_transport_protocol(&self) -> TransportKind;

    /// `(host, port)` of the peer this connection was established to.
    fn get_destination(&self) -> (String, u16);

    /// `host:port` of this connection's local endpoint, stamped into the
    /// topmost Via on send (spec.md §4.3).
    fn get_local_sent_by(&self) -> (String, u16);

    /// Best-effort fire-and-forget send (spec.md §6: "best-effort
    /// fire-and-forget").
    async fn send_message(&self, message: Message) -> Result<()>;
}

/// The transport-facing trait the transaction layer is built against
/// (spec.md §6). A production implementation would bind real UDP/TCP/TLS
/// sockets; this crate ships only the trait and an in-memory
/// [`crate::mock::MockTransport`] test double, per spec.md §1's scope cut.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolves `uri` to a connection, establishing one if necessary
    /// (spec.md §6 `connect(uri, callback)`; the callback is modeled here
    /// as the returned future rather than an explicit continuation
    /// parameter, the idiomatic async-Rust shape for the same contract).
    async fn connect(&self, uri: &sipt_core::Uri) -> Result<Arc<dyn Connection>>;
}

/// An event a transport implementation pushes upward into the transaction
/// layer's `on_message`/`on_transport_error` entry points (spec.md §4.5,
/// §6).
#[derive(Debug, Clone)]
pub enum TransportEvent {
    MessageReceived {
        message: Message,
        source: (String, u16),
    },
    Error {
        key_hint: Option<String>,
        error: String,
    },
}
