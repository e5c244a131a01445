//! Shared test harness for the integration suite, grounded on
//! `rvoip-transaction-core`'s `transaction_test_utils` pattern but built
//! around `tokio::time::pause`/`advance` instead of real sleeps
//! (SPEC_FULL.md "AMBIENT: TEST TOOLING").

use std::sync::Arc;
use std::time::Duration;

use sipt_core::{Message, Method, Request, StatusCode};
use sipt_transaction::{TransactionConfig, TransactionEvent, TransactionLayer};
use sipt_transport::{MockTransport, TransportKind};
use tokio::sync::mpsc;

pub struct TestEnvironment {
    pub layer: TransactionLayer,
    pub transport: Arc<MockTransport>,
    pub events: mpsc::Receiver<TransactionEvent>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sipt_transaction=debug")
        .with_test_writer()
        .try_init();
}

impl TestEnvironment {
    /// Builds a layer wired to a [`MockTransport`] bound at
    /// `10.0.0.1:5062`, with `config` controlling the timer schedule.
    pub fn new(kind: TransportKind, config: TransactionConfig) -> TestEnvironment {
        init_tracing();
        let (transport, transport_events) = MockTransport::new(kind, ("10.0.0.1".to_string(), 5062));
        let transport = Arc::new(transport);
        let (layer, events) = TransactionLayer::new(transport.clone(), config);
        let layer_for_pump = layer.clone();
        tokio::spawn(async move {
            layer_for_pump.run_transport_events(transport_events).await;
        });
        TestEnvironment { layer, transport, events }
    }

    pub fn udp(config: TransactionConfig) -> TestEnvironment {
        TestEnvironment::new(TransportKind::Udp, config)
    }

    /// Waits for the next upward event. The caller is expected to have
    /// already advanced the paused clock past whatever timer should
    /// produce it; this only waits on the (non-time-gated) channel.
    pub async fn next_event(&mut self) -> Option<TransactionEvent> {
        self.events.recv().await
    }
}

pub fn sample_invite(branch: &str) -> Request {
    let mut req = Request::new(Method::Invite, "sip:bob@biloxi.com".parse().unwrap());
    req.headers.add_header(&format!("Via: SIP/2.0/UDP pc33.atlanta.com;branch={branch}"));
    req.headers.add_header("From: Alice <sip:alice@atlanta.com>;tag=1928301774");
    req.headers.add_header("To: Bob <sip:bob@biloxi.com>");
    req.headers.add_header("Call-ID: a84b4c76e66710@pc33.atlanta.com");
    req.headers.add_header("CSeq: 1 INVITE");
    req.headers.add_header("Max-Forwards: 70");
    req
}

pub fn sample_register(branch: &str) -> Request {
    let mut req = Request::new(Method::Register, "sip:registrar.atlanta.com".parse().unwrap());
    req.headers.add_header(&format!("Via: SIP/2.0/UDP pc33.atlanta.com;branch={branch}"));
    req.headers.add_header("From: Alice <sip:alice@atlanta.com>;tag=1928301774");
    req.headers.add_header("To: Alice <sip:alice@atlanta.com>");
    req.headers.add_header("Call-ID: reg1@pc33.atlanta.com");
    req.headers.add_header("CSeq: 1 REGISTER");
    req
}

pub fn response_for(request: &Request, status: StatusCode, reason: &str) -> Message {
    Message::Response(request.create_response(status, reason))
}
