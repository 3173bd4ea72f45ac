//! Broadcast feed of queue progress.
//!
//! Replaces the original per-task `then(success)` callback and the reactive
//! "Bond" observables: subscribers get every per-link status transition plus
//! an exactly-once chain resolution event, with an explicit
//! subscribe/unsubscribe lifecycle (dropping the receiver unsubscribes).

use crate::task::{TaskId, TaskStatus};

/// An event published by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// One link of a chain changed state.
    StatusChanged {
        task_id: TaskId,
        root_id: TaskId,
        status: TaskStatus,
    },

    /// A whole chain reached its final outcome. Emitted exactly once per
    /// chain: `success` is `true` only when every link succeeded.
    ChainResolved { root_id: TaskId, success: bool },
}
