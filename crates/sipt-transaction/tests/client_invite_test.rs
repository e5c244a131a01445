//! Integration tests for the client transaction task loop against
//! the non-INVITE timeout/retransmission schedule and the INVITE
//! provisional-then-final lifecycle over an unreliable transport.

mod support;

use std::time::Duration;

use sipt_core::{Method, Request, StatusCode};
use sipt_transaction::{TransactionConfig, TransactionEvent};
use support::{response_for, sample_invite, sample_register, TestEnvironment};

#[tokio::test(start_paused = true)]
async fn non_invite_client_retransmits_and_times_out() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let request = sample_register("z9hG4bK-reg1");
    let key = env.layer.send_request(request).await.unwrap();

    // 64*T1 = 32s with the default config; a single jump lets every
    // chained retransmit timer in between fire in order.
    tokio::time::advance(Duration::from_secs(33)).await;

    match env.next_event().await {
        Some(TransactionEvent::TimedOut { key: timed_out }) => assert_eq!(timed_out, key),
        other => panic!("expected TimedOut, got {other:?}"),
    }
    match env.next_event().await {
        Some(TransactionEvent::TransactionTerminated { key: terminated }) => assert_eq!(terminated, key),
        other => panic!("expected TransactionTerminated, got {other:?}"),
    }

    // Initial send plus every retransmit the capped backoff schedule
    // (500ms, 1s, 2s, 4s, 4s, 4s, 4s, ...) fires before the timeout.
    assert!(env.transport.sent_count() >= 8);
}

#[tokio::test(start_paused = true)]
async fn invite_client_delivers_the_180_then_completes_on_the_200() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let request = sample_invite("z9hG4bK-inv1");
    let key = env.layer.send_request(request.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(50)).await;
    let ringing = response_for(&request, StatusCode::RINGING, "Ringing");
    env.transport.deliver(ringing, ("10.1.1.1".to_string(), 5060)).await;

    match env.next_event().await {
        Some(TransactionEvent::IncomingResponse { key: k, message }) => {
            assert_eq!(k, key);
            assert_eq!(message.as_response().unwrap().status, StatusCode::RINGING);
        }
        other => panic!("expected the 180 to be delivered, got {other:?}"),
    }

    let ok = response_for(&request, StatusCode::OK, "OK");
    env.transport.deliver(ok, ("10.1.1.1".to_string(), 5060)).await;

    match env.next_event().await {
        Some(TransactionEvent::IncomingResponse { key: k, message }) => {
            assert_eq!(k, key);
            assert_eq!(message.as_response().unwrap().status, StatusCode::OK);
        }
        other => panic!("expected the 200 to be delivered, got {other:?}"),
    }

    // The retransmission timer is cancelled the moment any response
    // arrives; nothing further should go out before Timer D elapses.
    let sent_before_timer_d = env.transport.sent_count();
    tokio::time::advance(Duration::from_secs(33)).await;
    assert_eq!(env.transport.sent_count(), sent_before_timer_d);

    match env.next_event().await {
        Some(TransactionEvent::TransactionTerminated { key: k }) => assert_eq!(k, key),
        other => panic!("expected termination once Timer D elapses, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn outgoing_invite_is_stamped_with_the_connection_s_local_sent_by() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let request = sample_invite("z9hG4bK-inv2");
    env.layer.send_request(request).await.unwrap();
    tokio::time::advance(Duration::from_millis(10)).await;

    let sent = env.transport.take_sent().expect("the INVITE should have been sent");
    let via = sent.enumerate_via().into_iter().next().expect("a Via header");
    assert_eq!(via.sent_by(), "10.0.0.1:5062");
    assert!(via.branch().is_some());
}

#[tokio::test(start_paused = true)]
async fn outgoing_ack_goes_straight_to_transport_with_no_client_transaction() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let mut ack = Request::new(Method::Ack, "sip:bob@biloxi.com".parse().unwrap());
    ack.headers.add_header("From: Alice <sip:alice@atlanta.com>;tag=1928301774");
    ack.headers.add_header("To: Bob <sip:bob@biloxi.com>;tag=a6c85cf");
    ack.headers.add_header("Call-ID: a84b4c76e66710@pc33.atlanta.com");
    ack.headers.add_header("CSeq: 1 ACK");

    env.layer.send_request(ack).await.unwrap();
    tokio::time::advance(Duration::from_millis(10)).await;

    let sent = env.transport.take_sent().expect("the ACK should have been sent directly");
    assert_eq!(sent.as_request().unwrap().method, Method::Ack);

    // No client transaction was spawned for it: nothing times out and no
    // event ever arrives for this send, no matter how long the clock runs.
    tokio::time::advance(Duration::from_secs(33)).await;
    assert!(env.events.try_recv().is_err());
}
