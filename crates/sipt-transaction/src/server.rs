//! The server transaction state machine (spec.md §4.4), mirroring
//! `client.rs`'s concrete task-loop shape rather than the teacher's
//! generic `TransactionLogic` machinery.

use std::sync::{Arc, Weak};
use std::time::Duration;

use sipt_core::{Message, Request, Response, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TransactionConfig;
use crate::events::TransactionEvent;
use crate::key::TransactionKey;
use crate::registry::TransactionRegistry;
use sipt_transport::Connection;

/// How long a server transaction waits before auto-sending a `100
/// Trying` for an INVITE the TU hasn't answered yet (spec.md §4.4).
const AUTO_TRYING_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Trying,
    Proceeding,
    Completed,
    Confirmed,
    Terminated,
}

#[derive(Debug)]
enum ServerCommand {
    /// The same request arriving again (retransmission detected by the
    /// registry matching on the transaction key).
    DuplicateRequest,
    Ack(Message),
    SendResponse(Response),
    TimerAutoTrying,
    TimerRetransmit,
    /// INVITE-only 64·T1 timer armed in `Completed` (spec.md §4.4); fires
    /// `OnTimedOut` upward before terminating.
    TimerTimeout,
    /// Non-INVITE `Completed` cleanup timer (64·T1, UDP only); plain
    /// termination, no `OnTimedOut` (spec.md §4.4).
    TimerNonInviteDone,
    TimerConfirmedDone,
    Terminate,
}

#[derive(Clone)]
pub struct ServerHandle {
    key: TransactionKey,
    cmd_tx: mpsc::Sender<ServerCommand>,
}

impl ServerHandle {
    pub fn key(&self) -> &TransactionKey {
        &self.key
    }

    /// Notifies the transaction of a retransmitted copy of the original
    /// request (spec.md §4.4: "while Proceeding/Completed, resend the
    /// last response").
    pub async fn deliver_duplicate_request(&self) {
        let _ = self.cmd_tx.send(ServerCommand::DuplicateRequest).await;
    }

    /// Delivers an inbound ACK matching this INVITE server transaction
    /// (spec.md §4.4 Completed -> Confirmed).
    pub async fn deliver_ack(&self, message: Message) {
        let _ = self.cmd_tx.send(ServerCommand::Ack(message)).await;
    }

    /// The transaction user sends a response through this transaction
    /// (spec.md §4.4/§4.5 `send_response`).
    pub async fn send_response(&self, response: Response) {
        let _ = self.cmd_tx.send(ServerCommand::SendResponse(response)).await;
    }

    pub async fn terminate(&self) {
        let _ = self.cmd_tx.send(ServerCommand::Terminate).await;
    }
}

fn schedule(cmd_tx: mpsc::Sender<ServerCommand>, after: Duration, cmd: ServerCommand) -> JoinHandle<()> {
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

/// Registers a new server transaction for `request`, surfaces it upward
/// as [`TransactionEvent::IncomingRequest`], and spawns its task loop
/// (spec.md §4.4, §4.5).
pub fn spawn_server_transaction(
    key: TransactionKey,
    request: Request,
    connection: Arc<dyn Connection>,
    config: TransactionConfig,
    registry: Weak<dyn TransactionRegistry>,
    tu_events: mpsc::Sender<TransactionEvent>,
) -> ServerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let handle = ServerHandle {
        key: key.clone(),
        cmd_tx: cmd_tx.clone(),
    };
    tokio::spawn(run_server(key, request, connection, config, registry, tu_events, cmd_tx, cmd_rx));
    handle
}

async fn run_server(
    key: TransactionKey,
    request: Request,
    connection: Arc<dyn Connection>,
    config: TransactionConfig,
    registry: Weak<dyn TransactionRegistry>,
    tu_events: mpsc::Sender<TransactionEvent>,
    cmd_tx: mpsc::Sender<ServerCommand>,
    mut cmd_rx: mpsc::Receiver<ServerCommand>,
) {
    let is_invite = request.method.is_invite();
    let is_reliable = connection.get_transport_protocol().is_reliable();

    let _ = tu_events
        .send(TransactionEvent::IncomingRequest {
            key: key.clone(),
            message: Message::Request(request.clone()),
        })
        .await;

    let mut state = if is_invite { ServerState::Proceeding } else { ServerState::Trying };
    let mut last_response: Option<Message> = None;
    let mut retransmit_count: u32 = 0;

    let mut auto_trying_handle = if is_invite {
        Some(schedule(cmd_tx.clone(), AUTO_TRYING_DELAY, ServerCommand::TimerAutoTrying))
    } else {
        None
    };
    let mut retransmit_handle: Option<JoinHandle<()>> = None;
    let mut timeout_handle: Option<JoinHandle<()>> = None;
    let mut confirmed_handle: Option<JoinHandle<()>> = None;

    macro_rules! terminate_now {
        () => {{
            abort(&mut auto_trying_handle);
            abort(&mut retransmit_handle);
            abort(&mut timeout_handle);
            abort(&mut confirmed_handle);
            if let Some(reg) = registry.upgrade() {
                reg.remove_server(&key);
            }
            let _ = tu_events
                .send(TransactionEvent::TransactionTerminated { key: key.clone() })
                .await;
            break;
        }};
    }

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            ServerCommand::DuplicateRequest => {
                if let Some(resp) = last_response.clone() {
                    let _ = connection.send_message(resp).await;
                }
            }

            ServerCommand::Ack(_message) => {
                if is_invite && state == ServerState::Completed {
                    abort(&mut retransmit_handle);
                    abort(&mut timeout_handle);
                    state = ServerState::Confirmed;
                    if is_reliable {
                        terminate_now!();
                    }
                    confirmed_handle = Some(schedule(cmd_tx.clone(), config.t4, ServerCommand::TimerConfirmedDone));
                }
            }

            ServerCommand::SendResponse(response) => {
                // Ignore a second final response attempt once one has
                // already been sent (sippet's `ServerTransaction::SendResponse`
                // guards the same way before touching the connection).
                if !matches!(state, ServerState::Trying | ServerState::Proceeding) {
                    continue;
                }

                abort(&mut auto_trying_handle);
                let class = response.status.class();
                let message = Message::Response(response);
                let _ = connection.send_message(message.clone()).await;
                last_response = Some(message);

                if class == 1 {
                    state = ServerState::Proceeding;
                    continue;
                }

                state = ServerState::Completed;
                if !is_invite {
                    if is_reliable {
                        terminate_now!();
                    }
                    timeout_handle = Some(schedule(cmd_tx.clone(), config.timeout(), ServerCommand::TimerNonInviteDone));
                    continue;
                }

                if class == 2 {
                    terminate_now!();
                }

                if !is_reliable {
                    retransmit_count = 0;
                    retransmit_handle = Some(schedule(
                        cmd_tx.clone(),
                        config.retry_interval_capped(0),
                        ServerCommand::TimerRetransmit,
                    ));
                }
                timeout_handle = Some(schedule(cmd_tx.clone(), config.timeout(), ServerCommand::TimerTimeout));
            }

            ServerCommand::TimerAutoTrying => {
                if state == ServerState::Proceeding && last_response.is_none() {
                    let message = Message::Response(request.create_response(StatusCode::TRYING, "Trying"));
                    let _ = connection.send_message(message.clone()).await;
                    last_response = Some(message);
                }
            }

            ServerCommand::TimerRetransmit => {
                if state == ServerState::Completed {
                    if let Some(resp) = last_response.clone() {
                        let _ = connection.send_message(resp).await;
                    }
                    retransmit_count += 1;
                    let next = config.retry_interval_capped(retransmit_count);
                    retransmit_handle = Some(schedule(cmd_tx.clone(), next, ServerCommand::TimerRetransmit));
                }
            }

            ServerCommand::TimerTimeout => {
                let _ = tu_events.send(TransactionEvent::TimedOut { key: key.clone() }).await;
                terminate_now!();
            }

            ServerCommand::TimerNonInviteDone
            | ServerCommand::TimerConfirmedDone
            | ServerCommand::Terminate => {
                terminate_now!();
            }
        }
    }
}
