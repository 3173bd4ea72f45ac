//! Error taxonomy for the queue and its collaborators.
//!
//! Failures never cross the queue boundary as panics: client and store
//! errors are recorded on the failing link's row and surfaced to callers via
//! [`QueueEvent::ChainResolved`](crate::events::QueueEvent) and
//! [`Queue::wait_chain`](crate::dispatcher::Queue::wait_chain). The enums
//! here cover the operations that *do* return `Result` directly (enqueue,
//! resume, store access).

use thiserror::Error;

use crate::task::TaskId;

/// Errors reported by the chain or chat client transports.
///
/// The error-first callback convention of the original wire clients, as a
/// tagged union.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The underlying node or messaging-server socket is down.
    #[error("not connected to {service}")]
    NotConnected { service: String },

    /// The remote itself reported a failure (populated error-first argument).
    #[error("remote error: {0}")]
    Remote(String),

    /// The named func/method does not exist on this client.
    #[error("unknown method: {0}")]
    UnknownMethod(String),
}

/// Errors produced by a [`QueueStore`](crate::store::QueueStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A persisted row failed to decode (bad uuid, unknown status, …).
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the public [`Queue`](crate::dispatcher::Queue) API.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The descriptor failed enqueue-time validation.
    #[error("malformed task: {0}")]
    MalformedTask(String),

    /// Precondition failure: the signing account cannot fund the extrinsic.
    /// Raised before submit, so no chain nonce is consumed.
    #[error("insufficient balance for {address}: free {free}, required {required}")]
    InsufficientBalance {
        address: String,
        free: u64,
        required: u64,
    },

    /// The dispatch command channel is at capacity.
    #[error("queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The dispatcher's background loop has exited.
    #[error("queue dispatcher shut down")]
    Shutdown,

    /// The referenced task does not exist in the store.
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
