//! The transport trait boundary consumed by `sipt-transaction`, plus an
//! in-memory mock transport used by its test suite (spec.md §1, §6).
//!
//! Real UDP/TCP/TLS/WS socket implementations are explicitly out of scope
//! (spec.md §1) — this crate only carries the seam and a test double, the
//! same split the teacher crate (`rvoip-sip-transport`) makes between its
//! `Transport` trait and its concrete `Udp`/`Tcp`/`Tls`/`WebSocket`
//! transports.

pub mod error;
pub mod mock;
pub mod transport;

pub use error::{Error, Result};
pub use mock::{MockConnection, MockTransport};
pub use transport::{Connection, Transport, TransportEvent, TransportKind};
