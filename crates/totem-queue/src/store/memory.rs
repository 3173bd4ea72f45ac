//! In-memory [`QueueStore`] for tests and sessions that opt out of
//! durability.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{QueueStore, TaskRow};
use crate::task::{TaskId, TaskStatus};

/// Thread-safe map of task rows behind an `RwLock`, so many readers can
/// observe status concurrently while the single dispatcher writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<TaskId, TaskRow>,
    /// Root ids in insertion order; FIFO resume depends on it.
    roots: Vec<TaskId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn insert_chain(&self, rows: &[TaskRow]) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(first) = rows.first() {
            inner.roots.push(first.root_id);
        }
        for row in rows {
            inner.rows.insert(row.id, row.clone());
        }
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRow>, StoreError> {
        Ok(self.inner.read().await.rows.get(&id).cloned())
    }

    async fn load_chain(&self, root_id: TaskId) -> Result<Vec<TaskRow>, StoreError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<TaskRow> = inner
            .rows
            .values()
            .filter(|r| r.root_id == root_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.position);
        Ok(rows)
    }

    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<&Value>,
        error_msg: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.rows.get_mut(&id) {
            row.status = status;
            row.result = result.cloned();
            row.error_msg = error_msg.map(str::to_owned);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn unresolved_roots(&self) -> Result<Vec<TaskId>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .roots
            .iter()
            .filter(|root| {
                inner
                    .rows
                    .values()
                    .any(|r| r.root_id == **root && !r.status.is_terminal())
            })
            .copied()
            .collect())
    }
}
