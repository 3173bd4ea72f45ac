//! SQLite implementation of [`QueueStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature. Migrations are run automatically
//! on connect.
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary. The database file location is a runtime
//! concern of the caller.
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used deliberately so that no
//! `DATABASE_URL` environment variable is needed at compile time.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::warn;

use crate::error::StoreError;
use crate::store::{QueueStore, TaskRow};
use crate::task::{TaskId, TaskStatus};

/// SQLite-backed durable queue store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending
    /// migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://totem-queue.db"` or `"sqlite::memory:"` for tests.
    ///
    /// The pool is capped at a single connection: the queue has exactly one
    /// writer, one connection never hits `SQLITE_BUSY`, and it makes the
    /// in-memory URL behave as one shared database across calls.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

/// Raw shape of a `tasks` row as selected from SQLite.
type RawRow = (
    String,         // id
    String,         // root_id
    Option<String>, // parent_id
    i64,            // position
    String,         // descriptor
    String,         // status
    Option<String>, // result
    Option<String>, // error_msg
    String,         // created_at
    String,         // updated_at
);

const SELECT_COLUMNS: &str = "id, root_id, parent_id, position, descriptor, \
     status, result, error_msg, created_at, updated_at";

fn decode(raw: RawRow) -> Result<TaskRow, StoreError> {
    let (id, root_id, parent_id, position, descriptor, status, result, error_msg, created_at, updated_at) =
        raw;
    Ok(TaskRow {
        id: parse_uuid(&id)?,
        root_id: parse_uuid(&root_id)?,
        parent_id: parent_id.as_deref().map(parse_uuid).transpose()?,
        position: u32::try_from(position)
            .map_err(|_| StoreError::Corrupt(format!("negative position {position}")))?,
        task: serde_json::from_str(&descriptor)?,
        status: TaskStatus::from_str(&status)
            .map_err(|_| StoreError::Corrupt(format!("unknown status '{status}'")))?,
        result: result.as_deref().map(serde_json::from_str).transpose()?,
        error_msg,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

fn parse_uuid(raw: &str) -> Result<TaskId, StoreError> {
    raw.parse()
        .map_err(|e| StoreError::Corrupt(format!("bad task id '{raw}': {e}")))
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        warn!(raw = %raw, error = %e, "failed to parse task timestamp; using now");
        Utc::now()
    })
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn insert_chain(&self, rows: &[TaskRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            let descriptor = serde_json::to_string(&row.task)?;
            let result = row.result.as_ref().map(serde_json::to_string).transpose()?;
            sqlx::query(
                "INSERT INTO tasks (id, root_id, parent_id, position, descriptor, \
                 status, result, error_msg, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .bind(row.id.to_string())
            .bind(row.root_id.to_string())
            .bind(row.parent_id.map(|id| id.to_string()))
            .bind(i64::from(row.position))
            .bind(&descriptor)
            .bind(row.status.to_string())
            .bind(&result)
            .bind(&row.error_msg)
            .bind(row.created_at.to_rfc3339())
            .bind(row.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: TaskId) -> Result<Option<TaskRow>, StoreError> {
        let raw: Option<RawRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        raw.map(decode).transpose()
    }

    async fn load_chain(&self, root_id: TaskId) -> Result<Vec<TaskRow>, StoreError> {
        let raw: Vec<RawRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM tasks WHERE root_id = ?1 ORDER BY position"
        ))
        .bind(root_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        raw.into_iter().map(decode).collect()
    }

    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        result: Option<&Value>,
        error_msg: Option<&str>,
    ) -> Result<(), StoreError> {
        let result = result.map(serde_json::to_string).transpose()?;
        sqlx::query(
            "UPDATE tasks SET status = ?1, result = ?2, error_msg = ?3, updated_at = ?4 \
             WHERE id = ?5",
        )
        .bind(status.to_string())
        .bind(&result)
        .bind(error_msg)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unresolved_roots(&self) -> Result<Vec<TaskId>, StoreError> {
        let raw: Vec<(String,)> = sqlx::query_as(
            "SELECT root_id FROM tasks \
             WHERE status IN ('pending', 'blocked', 'dispatched') \
             GROUP BY root_id ORDER BY MIN(rowid)",
        )
        .fetch_all(&self.pool)
        .await?;
        raw.iter().map(|(root,)| parse_uuid(root)).collect()
    }
}
