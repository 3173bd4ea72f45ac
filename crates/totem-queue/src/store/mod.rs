//! Durable queue state.
//!
//! A chain is flattened into one row per link at enqueue time; every status
//! transition is persisted before the dispatcher moves on, so an interrupted
//! session can resume from the store alone. Terminal rows are retained as
//! the audit trail — nothing here deletes them.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;
use crate::task::{TaskDescriptor, TaskId, TaskStatus};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// The persisted record for a single chain link.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: TaskId,
    /// Id of the chain's first link. Equal to `id` on the root row.
    pub root_id: TaskId,
    /// `None` on the root row.
    pub parent_id: Option<TaskId>,
    /// Index of this link within its chain, root = 0.
    pub position: u32,
    /// The link's descriptor with `next` stripped (chaining lives in
    /// `parent_id`/`position`).
    pub task: TaskDescriptor,
    pub status: TaskStatus,
    /// The remote's result value, set on success.
    pub result: Option<Value>,
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRow {
    /// Flatten a (validated) chain into rows: the root link `Pending`, every
    /// child `Blocked` on its parent.
    pub fn from_chain(task: &TaskDescriptor) -> Vec<TaskRow> {
        let now = Utc::now();
        let root_id = Uuid::new_v4();
        let mut rows = Vec::with_capacity(task.chain_len());

        let mut link = Some(Box::new(task.clone()));
        let mut parent_id: Option<TaskId> = None;
        let mut position = 0u32;
        while let Some(mut current) = link {
            link = current.next.take();
            let id = if position == 0 { root_id } else { Uuid::new_v4() };
            rows.push(TaskRow {
                id,
                root_id,
                parent_id,
                position,
                task: *current,
                status: if position == 0 {
                    TaskStatus::Pending
                } else {
                    TaskStatus::Blocked
                },
                result: None,
                error_msg: None,
                created_at: now,
                updated_at: now,
            });
            parent_id = Some(id);
            position += 1;
        }
        rows
    }
}

/// Final outcome of a chain, if it has one yet.
///
/// `Some(false)` as soon as any link failed, `Some(true)` once every link
/// succeeded, `None` while work remains (or for an empty slice).
pub fn chain_outcome(rows: &[TaskRow]) -> Option<bool> {
    if rows.is_empty() {
        return None;
    }
    if rows.iter().any(|r| r.status == TaskStatus::Failed) {
        return Some(false);
    }
    if rows.iter().all(|r| r.status == TaskStatus::Succeeded) {
        return Some(true);
    }
    None
}

/// Storage backend for queue state.
///
/// Exactly one dispatcher writes at a time; implementations only need to
/// keep concurrent readers consistent.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a freshly flattened chain. All-or-nothing.
    async fn insert_chain(&self, rows: &[TaskRow]) -> Result<(), StoreError>;

    /// Fetch a single link by id.
    async fn get(&self, id: TaskId) -> Result<Option<TaskRow>, StoreError>;

    /// All links of a chain, ordered by position. Empty if unknown.
    async fn load_chain(&self, root_id: TaskId) -> Result<Vec<TaskRow>, StoreError>;

    /// Record a status transition, optionally with the success result or the
    /// failure message.
    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<&Value>,
        error_msg: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Roots of chains still holding non-terminal links, in enqueue order.
    /// This is the resume worklist after a restart.
    async fn unresolved_roots(&self) -> Result<Vec<TaskId>, StoreError>;
}
