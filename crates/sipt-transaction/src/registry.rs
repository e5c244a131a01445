//! The transaction layer's public entry point (spec.md §4.5), grounded on
//! `transaction-core`'s `TransactionManager`/`TransactionRegistry` split but
//! collapsed into a single registry since this crate only ever runs one
//! transport and one transaction user per instance.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;
use sipt_core::{Message, Method, Request, Response};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::client::{spawn_client_transaction, ClientHandle};
use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use crate::events::TransactionEvent;
use crate::key::TransactionKey;
use crate::server::{spawn_server_transaction, ServerHandle};
use sipt_transport::{Transport, TransportEvent};

/// The deregistration seam [`crate::client`] and [`crate::server`] task
/// loops call back into once a transaction reaches `Terminated`, without
/// needing to depend on [`RegistryInner`]'s full type.
pub trait TransactionRegistry: Send + Sync {
    fn remove_client(&self, key: &TransactionKey);
    fn remove_server(&self, key: &TransactionKey);
}

struct RegistryInner {
    clients: Mutex<HashMap<TransactionKey, ClientHandle>>,
    servers: Mutex<HashMap<TransactionKey, ServerHandle>>,
    transport: Arc<dyn Transport>,
    config: TransactionConfig,
    tu_events: mpsc::Sender<TransactionEvent>,
    // Terminated keys observed before the owning map entry was inserted
    // (the spawn and the registration race harmlessly; this absorbs it).
    early_terminations: SyncMutex<Vec<TransactionKey>>,
}

impl TransactionRegistry for RegistryInner {
    fn remove_client(&self, key: &TransactionKey) {
        if let Ok(mut clients) = self.clients.try_lock() {
            clients.remove(key);
        } else {
            self.early_terminations.lock().push(key.clone());
        }
    }

    fn remove_server(&self, key: &TransactionKey) {
        if let Ok(mut servers) = self.servers.try_lock() {
            servers.remove(key);
        } else {
            self.early_terminations.lock().push(key.clone());
        }
    }
}

/// The public SIP transaction layer (spec.md §1, §4.5). Owns no transport
/// of its own; dispatches outbound traffic through the `transport` it was
/// built with and inbound traffic fed to it via [`TransactionLayer::on_message`].
#[derive(Clone)]
pub struct TransactionLayer {
    inner: Arc<RegistryInner>,
}

impl TransactionLayer {
    /// Builds a new layer over `transport`, returning it alongside the
    /// receiving end of its upward event channel (spec.md §6 "Upward
    /// events").
    pub fn new(transport: Arc<dyn Transport>, config: TransactionConfig) -> (TransactionLayer, mpsc::Receiver<TransactionEvent>) {
        let (tu_events, rx) = mpsc::channel(256);
        let inner = Arc::new(RegistryInner {
            clients: Mutex::new(HashMap::new()),
            servers: Mutex::new(HashMap::new()),
            transport,
            config,
            tu_events,
            early_terminations: SyncMutex::new(Vec::new()),
        });
        (TransactionLayer { inner }, rx)
    }

    fn weak_registry(&self) -> std::sync::Weak<dyn TransactionRegistry> {
        Arc::downgrade(&self.inner) as std::sync::Weak<dyn TransactionRegistry>
    }

    /// Starts a client transaction for `request`, stamping a branch onto
    /// its topmost Via if it doesn't carry one already, and returns the
    /// key it was registered under (spec.md §4.3/§4.5 `send_request`).
    ///
    /// Special case: ACK is not handled by any client transaction — it is
    /// routed directly to the transport (spec.md §4.5), mirroring the ACK
    /// a client transaction sends itself on a non-2xx INVITE final.
    pub async fn send_request(&self, mut request: Request) -> Result<TransactionKey> {
        if request.headers.enumerate_header("Via").is_empty() {
            let branch = format!("z9hG4bK{}", Uuid::new_v4().simple());
            request
                .headers
                .add_header(&format!("Via: SIP/2.0/UDP 0.0.0.0:5060;branch={branch}"));
        }

        let key = TransactionKey::for_client(&Message::Request(request.clone()))
            .ok_or_else(|| Error::from(sipt_core::Error::MissingHeader("Via".to_string())))?;

        if request.method == Method::Ack {
            let connection = self
                .inner
                .transport
                .connect(&request.request_uri)
                .await
                .map_err(|err| Error::Transport(err.to_string()))?;
            connection
                .send_message(Message::Request(request))
                .await
                .map_err(|err| Error::Transport(err.to_string()))?;
            return Ok(key);
        }

        let handle = spawn_client_transaction(
            key.clone(),
            request,
            self.inner.config,
            self.inner.transport.clone(),
            self.weak_registry(),
            self.inner.tu_events.clone(),
        );
        self.inner.clients.lock().await.insert(key.clone(), handle);
        self.drain_early_terminations().await;
        Ok(key)
    }

    /// Routes an outbound response through the server transaction it
    /// belongs to (spec.md §4.4/§4.5 `send_response`).
    pub async fn send_response(&self, response: Response) -> Result<()> {
        let key = TransactionKey::for_server_response(&Message::Response(response.clone()))
            .ok_or_else(|| Error::from(sipt_core::Error::MissingHeader("Via".to_string())))?;
        let servers = self.inner.servers.lock().await;
        match servers.get(&key) {
            Some(handle) => {
                handle.send_response(response).await;
                Ok(())
            }
            None => Err(Error::UnknownTransaction(key.as_str().to_string())),
        }
    }

    /// Forces the named transaction to terminate immediately (spec.md
    /// §4.5 `terminate`).
    pub async fn terminate(&self, key: &TransactionKey) -> Result<()> {
        if let Some(handle) = self.inner.clients.lock().await.get(key) {
            handle.terminate().await;
            return Ok(());
        }
        if let Some(handle) = self.inner.servers.lock().await.get(key) {
            handle.terminate().await;
            return Ok(());
        }
        Err(Error::UnknownTransaction(key.as_str().to_string()))
    }

    /// Feeds one inbound message into the layer (spec.md §4.5
    /// `on_message`). Matches it to an existing transaction, spawns a new
    /// server transaction for unmatched requests, or drops unmatched
    /// responses (logged, never an error: spec.md §7 "Propagation").
    pub async fn on_message(&self, message: Message, source: (String, u16)) {
        match &message {
            Message::Response(_) => {
                let Some(key) = TransactionKey::for_client(&message) else {
                    tracing::debug!("dropping response with no branch/CSeq");
                    return;
                };
                let clients = self.inner.clients.lock().await;
                match clients.get(&key) {
                    Some(handle) => handle.deliver_response(message).await,
                    None => tracing::debug!(%key, "dropping response matching no client transaction"),
                }
            }
            Message::Request(req) if req.method == Method::Ack => {
                let Some(key) = TransactionKey::for_server_ack(&message) else {
                    return;
                };
                let servers = self.inner.servers.lock().await;
                if let Some(handle) = servers.get(&key) {
                    handle.deliver_ack(message).await;
                }
            }
            Message::Request(_req) => {
                let Some(key) = TransactionKey::for_server_request(&message) else {
                    tracing::debug!("dropping request with no branch/Via");
                    return;
                };
                {
                    let servers = self.inner.servers.lock().await;
                    if let Some(handle) = servers.get(&key) {
                        handle.deliver_duplicate_request().await;
                        return;
                    }
                }

                let Message::Request(request) = message else { unreachable!() };
                let destination: sipt_core::Uri = match format!("sip:{}:{}", source.0, source.1).parse() {
                    Ok(uri) => uri,
                    Err(_) => return,
                };
                let connection = match self.inner.transport.connect(&destination).await {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = self
                            .inner
                            .tu_events
                            .send(TransactionEvent::TransportError {
                                key,
                                error: err.to_string(),
                            })
                            .await;
                        return;
                    }
                };

                let handle = spawn_server_transaction(
                    key.clone(),
                    request,
                    connection,
                    self.inner.config,
                    self.weak_registry(),
                    self.inner.tu_events.clone(),
                );
                self.inner.servers.lock().await.insert(key, handle);
                self.drain_early_terminations().await;
            }
        }
    }

    /// Reports a transport-level failure against `key_hint`, if known
    /// (spec.md §4.3/§4.4 transport error handling).
    pub async fn on_transport_error(&self, key_hint: Option<String>, error: impl Into<String>) {
        let error = error.into();
        match key_hint {
            Some(raw) => {
                let key = TransactionKey::from_raw(raw);
                let _ = self
                    .inner
                    .tu_events
                    .send(TransactionEvent::TransportError { key, error })
                    .await;
            }
            None => tracing::warn!(%error, "transport error with no transaction hint"),
        }
    }

    /// Drains every event pushed onto `transport_events`, dispatching it
    /// through [`TransactionLayer::on_message`]/[`TransactionLayer::on_transport_error`].
    /// Intended to be run as a background task for the lifetime of the
    /// layer.
    pub async fn run_transport_events(&self, mut transport_events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = transport_events.recv().await {
            match event {
                TransportEvent::MessageReceived { message, source } => {
                    self.on_message(message, source).await;
                }
                TransportEvent::Error { key_hint, error } => {
                    self.on_transport_error(key_hint, error).await;
                }
            }
        }
    }

    /// Terminates every live transaction immediately, for orderly shutdown
    /// (spec.md §4.5 `stop`).
    pub async fn stop(&self) {
        for (_, handle) in self.inner.clients.lock().await.drain() {
            handle.terminate().await;
        }
        for (_, handle) in self.inner.servers.lock().await.drain() {
            handle.terminate().await;
        }
    }

    async fn drain_early_terminations(&self) {
        let pending: Vec<TransactionKey> = std::mem::take(&mut *self.inner.early_terminations.lock());
        if pending.is_empty() {
            return;
        }
        let mut clients = self.inner.clients.lock().await;
        let mut servers = self.inner.servers.lock().await;
        for key in pending {
            if key.is_client() {
                clients.remove(&key);
            } else {
                servers.remove(&key);
            }
        }
    }
}
