use sipt_core::Message;

use crate::key::TransactionKey;

/// Notifications the transaction layer pushes upward to the transaction
/// user (spec.md §5 "Upward events", §6). Delivered over the `mpsc` channel
/// supplied to `TransactionLayer::new`.
#[derive(Debug, Clone)]
pub enum TransactionEvent {
    /// A new server transaction was created for an inbound request that
    /// does not match any existing transaction (spec.md §4.5).
    IncomingRequest {
        key: TransactionKey,
        message: Message,
    },

    /// A response was delivered upward by a client transaction's state
    /// machine (spec.md §4.3 `deliver`).
    IncomingResponse {
        key: TransactionKey,
        message: Message,
    },

    /// A client transaction's 64·T1 timer fired before a final response
    /// arrived (spec.md §4.3 Termination / §7).
    TimedOut { key: TransactionKey },

    /// The transport reported a delivery failure for this transaction
    /// (spec.md §4.3/§4.4 Transport error handling).
    TransportError { key: TransactionKey, error: String },

    /// A transaction reached its Terminated state and was removed from the
    /// registry (spec.md §4.5 Resource model).
    TransactionTerminated { key: TransactionKey },
}
