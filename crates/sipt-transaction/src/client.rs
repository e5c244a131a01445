//! The client transaction state machine (spec.md §4.3), grounded on
//! `transaction-core`'s `client_transaction.rs` task-loop shape but
//! rebuilt around a single concrete loop shared by INVITE and non-INVITE
//! requests, rather than the teacher's generic `TransactionLogic` trait.

use std::sync::{Arc, Weak};
use std::time::Duration;

use sipt_core::{Message, Request, ViaEntry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::TransactionConfig;
use crate::events::TransactionEvent;
use crate::key::TransactionKey;
use crate::registry::TransactionRegistry;
use sipt_transport::{Connection, Transport};

/// States a client transaction passes through (spec.md §4.3). `Calling`
/// and `Trying` are the two possible starting states (INVITE vs.
/// non-INVITE); `ProceedCalling` is the INVITE-only state reached from
/// `Calling` on a provisional response, kept distinct from `Proceeding` so
/// the two request kinds never share a transition path after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Calling,
    Trying,
    Proceeding,
    ProceedCalling,
    Completed,
    Terminated,
}

/// Pure transition table for spec.md §4.3. Returns the next state and
/// whether the response should be delivered to the transaction user.
/// Retransmitted final responses in `Completed` are always absorbed.
pub fn client_transition(state: ClientState, is_invite: bool, class: u16) -> (ClientState, bool) {
    use ClientState::{Calling, Completed, ProceedCalling, Proceeding, Terminated};

    match (state, class) {
        (Completed, _) | (Terminated, _) => (state, false),
        (_, 1) => {
            let next = if is_invite {
                match state {
                    Calling | ProceedCalling => ProceedCalling,
                    _ => Proceeding,
                }
            } else {
                Proceeding
            };
            (next, true)
        }
        (_, _) => (Completed, true),
    }
}

/// Commands fed into a running client transaction's task loop.
#[derive(Debug)]
enum ClientCommand {
    Response(Message),
    TimerRetry,
    TimerTimeout,
    TimerTerminate,
    Terminate,
}

/// A handle to a running client transaction, held by the registry.
#[derive(Clone)]
pub struct ClientHandle {
    key: TransactionKey,
    cmd_tx: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    /// Feeds an inbound response matching this transaction's key into its
    /// task loop (spec.md §4.5 `on_message` dispatch).
    pub async fn deliver_response(&self, message: Message) {
        let _ = self.cmd_tx.send(ClientCommand::Response(message)).await;
    }

    /// Forces immediate termination, e.g. when the layer is shutting down
    /// (spec.md §4.5 `stop`).
    pub async fn terminate(&self) {
        let _ = self.cmd_tx.send(ClientCommand::Terminate).await;
    }
}

fn schedule(cmd_tx: mpsc::Sender<ClientCommand>, after: Duration, cmd: ClientCommand) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = cmd_tx.send(cmd).await;
    })
}

fn abort(handle: &mut Option<JoinHandle<()>>) {
    if let Some(h) = handle.take() {
        h.abort();
    }
}

/// Starts a client transaction: connects, stamps the topmost Via with the
/// chosen transport/local address/branch, sends the request, arms the
/// 64·T1 timeout and (on unreliable transports) the retransmission timer,
/// then spawns the task loop that drives it to `Terminated` (spec.md
/// §4.3).
pub fn spawn_client_transaction(
    key: TransactionKey,
    request: Request,
    config: TransactionConfig,
    transport: Arc<dyn Transport>,
    registry: Weak<dyn TransactionRegistry>,
    tu_events: mpsc::Sender<TransactionEvent>,
) -> ClientHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let handle = ClientHandle {
        key: key.clone(),
        cmd_tx: cmd_tx.clone(),
    };
    tokio::spawn(run_client(key, request, config, transport, registry, tu_events, cmd_tx, cmd_rx));
    handle
}

async fn run_client(
    key: TransactionKey,
    mut request: Request,
    config: TransactionConfig,
    transport: Arc<dyn Transport>,
    registry: Weak<dyn TransactionRegistry>,
    tu_events: mpsc::Sender<TransactionEvent>,
    cmd_tx: mpsc::Sender<ClientCommand>,
    mut cmd_rx: mpsc::Receiver<ClientCommand>,
) {
    let is_invite = request.method.is_invite();

    let connection = match transport.connect(&request.request_uri).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(%key, %err, "client transaction failed to connect");
            let _ = tu_events
                .send(TransactionEvent::TransportError {
                    key: key.clone(),
                    error: err.to_string(),
                })
                .await;
            return;
        }
    };

    let branch = request
        .headers
        .enumerate_header("Via")
        .first()
        .and_then(|v| ViaEntry::parse(v))
        .and_then(|e| e.branch().map(str::to_string))
        .unwrap_or_else(|| format!("z9hG4bK{}", Uuid::new_v4().simple()));

    let transport_kind = connection.get_transport_protocol();
    let (local_host, local_port) = connection.get_local_sent_by();
    request.headers.set_topmost_via(format!(
        "SIP/2.0/{} {}:{};branch={};rport",
        transport_kind.as_str(),
        local_host,
        local_port,
        branch
    ));

    if let Err(err) = connection.send_message(Message::Request(request.clone())).await {
        let _ = tu_events
            .send(TransactionEvent::TransportError {
                key: key.clone(),
                error: err.to_string(),
            })
            .await;
        return;
    }

    let mut state = if is_invite { ClientState::Calling } else { ClientState::Trying };
    let mut retransmit_count: u32 = 0;
    let mut cached_ack: Option<Request> = None;

    let mut timeout_handle = Some(schedule(cmd_tx.clone(), config.timeout(), ClientCommand::TimerTimeout));
    let mut terminate_handle: Option<JoinHandle<()>> = None;
    let mut retry_handle = if transport_kind.is_reliable() {
        None
    } else {
        let initial = if is_invite {
            config.retry_interval_uncapped(0)
        } else {
            config.retry_interval_capped(0)
        };
        Some(schedule(cmd_tx.clone(), initial, ClientCommand::TimerRetry))
    };

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            ClientCommand::Response(message) => {
                let Message::Response(ref resp) = message else {
                    continue;
                };
                let class = resp.status.class();

                abort(&mut retry_handle);

                if is_invite && class >= 3 {
                    let to_tag = message
                        .to()
                        .and_then(|(_, _, params)| params.into_iter().find(|(k, _)| k == "tag"))
                        .and_then(|(_, v)| v);
                    let ack = cached_ack
                        .get_or_insert_with(|| request.create_ack(to_tag.as_deref()))
                        .clone();
                    let _ = connection.send_message(Message::Request(ack)).await;
                }

                if matches!(state, ClientState::Completed | ClientState::Terminated) {
                    continue;
                }

                let (next_state, deliver) = client_transition(state, is_invite, class);
                state = next_state;

                if deliver {
                    let _ = tu_events
                        .send(TransactionEvent::IncomingResponse {
                            key: key.clone(),
                            message,
                        })
                        .await;
                }

                if state == ClientState::Completed {
                    abort(&mut timeout_handle);
                    if transport_kind.is_reliable() {
                        abort(&mut retry_handle);
                        abort(&mut terminate_handle);
                        if let Some(reg) = registry.upgrade() {
                            reg.remove_client(&key);
                        }
                        let _ = tu_events
                            .send(TransactionEvent::TransactionTerminated { key: key.clone() })
                            .await;
                        break;
                    }
                    let wait = if is_invite { config.timeout() } else { config.t4 };
                    terminate_handle = Some(schedule(cmd_tx.clone(), wait, ClientCommand::TimerTerminate));
                }
            }

            ClientCommand::TimerRetry => {
                let _ = connection.send_message(Message::Request(request.clone())).await;
                retransmit_count += 1;
                let interval = if is_invite {
                    config.retry_interval_uncapped(retransmit_count)
                } else {
                    config.retry_interval_capped(retransmit_count)
                };
                retry_handle = Some(schedule(cmd_tx.clone(), interval, ClientCommand::TimerRetry));
            }

            ClientCommand::TimerTimeout => {
                if matches!(state, ClientState::Completed | ClientState::Terminated) {
                    continue;
                }
                abort(&mut retry_handle);
                abort(&mut terminate_handle);
                let _ = tu_events.send(TransactionEvent::TimedOut { key: key.clone() }).await;
                if let Some(reg) = registry.upgrade() {
                    reg.remove_client(&key);
                }
                let _ = tu_events
                    .send(TransactionEvent::TransactionTerminated { key: key.clone() })
                    .await;
                break;
            }

            ClientCommand::TimerTerminate | ClientCommand::Terminate => {
                abort(&mut retry_handle);
                abort(&mut timeout_handle);
                abort(&mut terminate_handle);
                if let Some(reg) = registry.upgrade() {
                    reg.remove_client(&key);
                }
                let _ = tu_events
                    .send(TransactionEvent::TransactionTerminated { key: key.clone() })
                    .await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_provisional_from_calling_is_proceed_calling() {
        let (next, deliver) = client_transition(ClientState::Calling, true, 1);
        assert_eq!(next, ClientState::ProceedCalling);
        assert!(deliver);
    }

    #[test]
    fn non_invite_provisional_is_proceeding() {
        let (next, deliver) = client_transition(ClientState::Trying, false, 1);
        assert_eq!(next, ClientState::Proceeding);
        assert!(deliver);
    }

    #[test]
    fn final_response_completes_from_any_pre_completed_state() {
        for start in [
            ClientState::Calling,
            ClientState::Trying,
            ClientState::Proceeding,
            ClientState::ProceedCalling,
        ] {
            let (next, deliver) = client_transition(start, true, 2);
            assert_eq!(next, ClientState::Completed);
            assert!(deliver);
        }
    }

    #[test]
    fn completed_absorbs_retransmitted_finals() {
        let (next, deliver) = client_transition(ClientState::Completed, true, 4);
        assert_eq!(next, ClientState::Completed);
        assert!(!deliver);
    }
}
