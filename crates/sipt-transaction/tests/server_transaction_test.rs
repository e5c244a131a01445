//! Integration tests for the server transaction task loop: the
//! auto-`100 Trying` safety net for a slow transaction user, and the
//! INVITE server's Proceeding -> Completed -> Confirmed -> Terminated
//! lifecycle driven by an inbound ACK.

mod support;

use std::time::Duration;

use sipt_core::{Message, Method, StatusCode};
use sipt_transaction::{TransactionConfig, TransactionEvent};
use sipt_transport::TransportKind;
use support::{sample_invite, sample_register, TestEnvironment};

#[tokio::test(start_paused = true)]
async fn server_auto_sends_100_trying_when_the_tu_is_slow_to_answer() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let invite = sample_invite("z9hG4bK-srv1");
    env.transport
        .deliver(Message::Request(invite.clone()), ("192.0.2.4".to_string(), 5060))
        .await;

    match env.next_event().await {
        Some(TransactionEvent::IncomingRequest { message, .. }) => {
            assert_eq!(message.as_request().unwrap().method, Method::Invite);
        }
        other => panic!("expected IncomingRequest, got {other:?}"),
    }

    tokio::time::advance(Duration::from_millis(250)).await;

    let trying = env.transport.take_sent().expect("the auto 100 Trying should have been sent");
    assert_eq!(trying.as_response().unwrap().status, StatusCode::TRYING);
}

#[tokio::test(start_paused = true)]
async fn server_does_not_auto_answer_once_the_tu_has_already_responded() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let invite = sample_invite("z9hG4bK-srv2");
    env.transport
        .deliver(Message::Request(invite.clone()), ("192.0.2.4".to_string(), 5060))
        .await;
    env.next_event().await;

    let busy = invite.create_response(StatusCode::new(486).unwrap(), "Busy Here");
    env.layer.send_response(busy).await.unwrap();

    tokio::time::advance(Duration::from_millis(250)).await;

    // Only the one response the TU sent should have gone out; the
    // auto-trying timer must not fire a 100 behind it.
    assert_eq!(env.transport.sent_count(), 1);
    let sent = env.transport.take_sent().unwrap();
    assert_eq!(sent.as_response().unwrap().status, StatusCode::new(486).unwrap());
}

#[tokio::test(start_paused = true)]
async fn server_confirms_and_terminates_once_the_ack_for_a_non_2xx_final_arrives() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let invite = sample_invite("z9hG4bK-srv3");
    env.transport
        .deliver(Message::Request(invite.clone()), ("192.0.2.4".to_string(), 5060))
        .await;
    env.next_event().await;

    let busy = invite.create_response(StatusCode::new(486).unwrap(), "Busy Here");
    env.layer.send_response(busy).await.unwrap();
    tokio::time::advance(Duration::from_millis(10)).await;
    env.transport.take_sent();

    // While Completed and unreliable, the response keeps retransmitting
    // until the ACK arrives.
    tokio::time::advance(Duration::from_millis(600)).await;
    assert!(env.transport.sent_count() >= 1);
    while env.transport.take_sent().is_some() {}

    let ack = invite.create_ack(None);
    env.transport
        .deliver(Message::Request(ack), ("192.0.2.4".to_string(), 5060))
        .await;

    // Timer I (T4) runs out the Confirmed state before the transaction
    // is torn down.
    tokio::time::advance(Duration::from_secs(6)).await;
    match env.next_event().await {
        Some(TransactionEvent::TransactionTerminated { .. }) => {}
        other => panic!("expected termination after Timer I elapses, got {other:?}"),
    }

    // No further retransmissions once the ACK has confirmed receipt.
    assert_eq!(env.transport.sent_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn non_invite_server_over_reliable_transport_terminates_immediately_on_final_response() {
    let mut env = TestEnvironment::new(TransportKind::Tcp, TransactionConfig::default());
    let register = sample_register("z9hG4bK-srv4");
    env.transport
        .deliver(Message::Request(register.clone()), ("192.0.2.4".to_string(), 5060))
        .await;
    env.next_event().await;

    let ok = register.create_response(StatusCode::OK, "OK");
    env.layer.send_response(ok).await.unwrap();

    // Reliable transport: no T4 wait needed, termination is immediate.
    match env.next_event().await {
        Some(TransactionEvent::TransactionTerminated { .. }) => {}
        other => panic!("expected immediate termination on reliable transport, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn non_invite_server_over_udp_waits_64_t1_before_terminating() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let register = sample_register("z9hG4bK-srv5");
    env.transport
        .deliver(Message::Request(register.clone()), ("192.0.2.4".to_string(), 5060))
        .await;
    env.next_event().await;

    let ok = register.create_response(StatusCode::OK, "OK");
    env.layer.send_response(ok).await.unwrap();

    // Not yet terminated: T4 (5s default) elapsing alone isn't enough — the
    // non-INVITE Completed cleanup timer is 64*T1 (32s), not T4.
    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(env.events.try_recv().is_err());

    tokio::time::advance(Duration::from_secs(27)).await;
    match env.next_event().await {
        Some(TransactionEvent::TransactionTerminated { .. }) => {}
        other => panic!("expected termination after 64*T1 elapses, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn invite_server_completed_timeout_signals_timed_out_before_terminating() {
    let mut env = TestEnvironment::udp(TransactionConfig::default());
    let invite = sample_invite("z9hG4bK-srv6");
    env.transport
        .deliver(Message::Request(invite.clone()), ("192.0.2.4".to_string(), 5060))
        .await;
    env.next_event().await;

    let busy = invite.create_response(StatusCode::new(486).unwrap(), "Busy Here");
    env.layer.send_response(busy).await.unwrap();

    // 64*T1 = 32s default; no ACK ever arrives.
    tokio::time::advance(Duration::from_secs(33)).await;

    match env.next_event().await {
        Some(TransactionEvent::TimedOut { .. }) => {}
        other => panic!("expected TimedOut before termination, got {other:?}"),
    }
    match env.next_event().await {
        Some(TransactionEvent::TransactionTerminated { .. }) => {}
        other => panic!("expected TransactionTerminated after TimedOut, got {other:?}"),
    }
}
