//! The queue dispatcher.
//!
//! [`Queue::start`] spawns a single background loop that drains the command
//! channel and executes one chain at a time, end to end. Independent chains
//! therefore run in strict FIFO enqueue order, and a chain's links run ahead
//! of any later-enqueued work — the dependent link never waits behind an
//! unrelated task.
//!
//! All state lives in the store; the loop never holds anything that could
//! not be rebuilt from a [`Queue::resume`] after a restart.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::client::{ChainClient, ChatClient};
use crate::config::QueueConfig;
use crate::error::{QueueError, StoreError};
use crate::events::QueueEvent;
use crate::gate;
use crate::store::{QueueStore, TaskRow, chain_outcome};
use crate::task::{TaskDescriptor, TaskId, TaskKind, TaskStatus};

/// Commands consumed by the dispatch loop.
#[derive(Debug)]
enum QueueCommand {
    /// Execute the chain rooted at `root_id`; its rows are already persisted.
    Run { root_id: TaskId },
}

/// Handle to a running queue.
///
/// Constructed once per session with its collaborators passed in
/// explicitly — there is no module-level singleton. Cloning the handle is
/// cheap and every clone drives the same background loop.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn QueueStore>,
    cmd_tx: mpsc::Sender<QueueCommand>,
    events_tx: broadcast::Sender<QueueEvent>,
    config: QueueConfig,
}

impl Queue {
    /// Start the queue: spawns the background dispatch loop and returns the
    /// handle.
    pub fn start(
        store: Arc<dyn QueueStore>,
        chain: Arc<dyn ChainClient>,
        chat: Arc<dyn ChatClient>,
        config: QueueConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.queue_capacity);
        let (events_tx, _) = broadcast::channel(config.event_capacity);

        let executor = Executor {
            store: Arc::clone(&store),
            chain,
            chat,
            events_tx: events_tx.clone(),
            min_balance: config.min_balance,
        };
        tokio::spawn(async move {
            executor.run_loop(cmd_rx).await;
        });

        Self {
            store,
            cmd_tx,
            events_tx,
            config,
        }
    }

    /// Validate, persist, and schedule a task chain. Non-blocking.
    ///
    /// Returns the root [`TaskId`] immediately; execution happens in the
    /// background. If the command channel is saturated the chain stays
    /// persisted as pending — a later [`Queue::resume`] picks it up — but
    /// [`QueueError::QueueFull`] is returned so the caller can tell the user.
    pub async fn add(&self, task: TaskDescriptor) -> Result<TaskId, QueueError> {
        task.validate(self.config.max_chain_depth)?;
        let rows = TaskRow::from_chain(&task);
        let root_id = rows[0].root_id;
        self.store.insert_chain(&rows).await?;
        self.schedule(root_id)?;
        info!(%root_id, links = rows.len(), title = %task.title, "task chain enqueued");
        Ok(root_id)
    }

    /// Re-schedule every chain with unfinished links, in enqueue order.
    ///
    /// Call once at session start. Succeeded links are never re-run; links
    /// interrupted mid-dispatch run again (at-least-once). Chains that
    /// already failed are not retried. Returns the number of chains
    /// scheduled.
    pub async fn resume(&self) -> Result<usize, QueueError> {
        let roots = self.store.unresolved_roots().await?;
        let mut scheduled = 0usize;
        for root_id in roots {
            match self.schedule(root_id) {
                Ok(()) => scheduled += 1,
                Err(QueueError::QueueFull { .. }) => {
                    // The rest stays persisted; a later resume gets it.
                    warn!(scheduled, "queue full during resume; deferring remaining chains");
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        if scheduled > 0 {
            info!(scheduled, "resumed persisted task chains");
        }
        Ok(scheduled)
    }

    /// Subscribe to the queue's event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events_tx.subscribe()
    }

    /// Current status of a single link.
    pub async fn status(&self, task_id: TaskId) -> Result<TaskStatus, QueueError> {
        self.store
            .get(task_id)
            .await?
            .map(|row| row.status)
            .ok_or(QueueError::TaskNotFound { task_id })
    }

    /// All persisted rows of a chain, ordered by position.
    pub async fn chain(&self, root_id: TaskId) -> Result<Vec<TaskRow>, QueueError> {
        let rows = self.store.load_chain(root_id).await?;
        if rows.is_empty() {
            return Err(QueueError::TaskNotFound { task_id: root_id });
        }
        Ok(rows)
    }

    /// Wait for the chain rooted at `root_id` to resolve; `true` when every
    /// link succeeded.
    ///
    /// The successor of the original `then(success)` callback. Safe to call
    /// after resolution: the store is consulted before waiting on events.
    pub async fn wait_chain(&self, root_id: TaskId) -> Result<bool, QueueError> {
        // Subscribe before the store check so a resolution landing between
        // the two is not missed.
        let mut rx = self.events_tx.subscribe();

        let rows = self.store.load_chain(root_id).await?;
        if rows.is_empty() {
            return Err(QueueError::TaskNotFound { task_id: root_id });
        }
        if let Some(success) = chain_outcome(&rows) {
            return Ok(success);
        }

        loop {
            match rx.recv().await {
                Ok(QueueEvent::ChainResolved { root_id: r, success }) if r == root_id => {
                    return Ok(success);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Missed events; the store has the truth.
                    let rows = self.store.load_chain(root_id).await?;
                    if let Some(success) = chain_outcome(&rows) {
                        return Ok(success);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(QueueError::Shutdown),
            }
        }
    }

    fn schedule(&self, root_id: TaskId) -> Result<(), QueueError> {
        self.cmd_tx
            .try_send(QueueCommand::Run { root_id })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::QueueFull {
                    capacity: self.config.queue_capacity,
                },
                mpsc::error::TrySendError::Closed(_) => QueueError::Shutdown,
            })
    }
}

/// The background worker owned by the dispatch loop.
struct Executor {
    store: Arc<dyn QueueStore>,
    chain: Arc<dyn ChainClient>,
    chat: Arc<dyn ChatClient>,
    events_tx: broadcast::Sender<QueueEvent>,
    min_balance: u64,
}

impl Executor {
    /// Drain commands one at a time. Each chain is awaited to resolution
    /// before the next command is taken, which is what serializes the queue.
    async fn run_loop(self, mut rx: mpsc::Receiver<QueueCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                QueueCommand::Run { root_id } => {
                    if let Err(e) = self.execute_chain(root_id).await {
                        // Store failures abort the chain without a recorded
                        // outcome; resume will pick it up again.
                        warn!(%root_id, error = %e, "chain execution aborted by store failure");
                    }
                }
            }
        }
        info!("queue dispatcher stopped");
    }

    /// Drive one chain link by link.
    ///
    /// Execution failures are terminal for the chain and recorded on the
    /// rows; only store failures propagate.
    async fn execute_chain(&self, root_id: TaskId) -> Result<(), StoreError> {
        let rows = self.store.load_chain(root_id).await?;
        if rows.is_empty() {
            warn!(%root_id, "scheduled chain not found in store");
            return Ok(());
        }
        // A completed chain is never re-run, even if scheduled twice.
        if chain_outcome(&rows).is_some() {
            return Ok(());
        }

        let mut parent_result: Option<Value> = None;
        for (idx, row) in rows.iter().enumerate() {
            if row.status == TaskStatus::Succeeded {
                // Resume path: carry the recorded result forward, don't re-run.
                parent_result = row.result.clone();
                continue;
            }

            self.transition(row, TaskStatus::Dispatched, None, None).await?;
            match self.run_link(&row.task, parent_result.as_ref()).await {
                Ok(value) => {
                    self.transition(row, TaskStatus::Succeeded, Some(&value), None)
                        .await?;
                    info!(task_id = %row.id, func = %row.task.func, "task succeeded");
                    parent_result = Some(value);
                }
                Err(err) => {
                    warn!(task_id = %row.id, func = %row.task.func, error = %err, "task failed");
                    self.transition(row, TaskStatus::Failed, None, Some(&err.to_string()))
                        .await?;
                    for skipped in &rows[idx + 1..] {
                        self.transition(skipped, TaskStatus::Skipped, None, None)
                            .await?;
                    }
                    self.resolve(root_id, false);
                    return Ok(());
                }
            }
        }

        self.resolve(root_id, true);
        Ok(())
    }

    /// Execute a single link against its client.
    async fn run_link(
        &self,
        task: &TaskDescriptor,
        parent_result: Option<&Value>,
    ) -> Result<Value, QueueError> {
        let mut task = task.clone();
        if let Some(parent) = parent_result {
            for &slot in &task.inherit {
                match task.args.get_mut(slot) {
                    Some(arg) => *arg = parent.clone(),
                    // Normally caught at enqueue; a hand-edited store row can
                    // still get here.
                    None => {
                        return Err(QueueError::MalformedTask(format!(
                            "inherit slot {slot} out of range for '{}'",
                            task.func
                        )));
                    }
                }
            }
        }

        match task.kind {
            TaskKind::Blockchain => {
                let address = task.address.as_deref().ok_or_else(|| {
                    QueueError::MalformedTask(format!(
                        "blockchain link '{}' is missing a signing address",
                        task.func
                    ))
                })?;
                let required = task.required_funds.unwrap_or(self.min_balance);
                gate::check_funds(self.chain.as_ref(), address, required).await?;
                Ok(self.chain.submit(address, &task.func, &task.args).await?)
            }
            TaskKind::ChatClient => Ok(self.chat.call(&task.func, &task.args).await?),
        }
    }

    async fn transition(
        &self,
        row: &TaskRow,
        status: TaskStatus,
        result: Option<&Value>,
        error_msg: Option<&str>,
    ) -> Result<(), StoreError> {
        self.store
            .set_status(row.id, status, result, error_msg)
            .await?;
        // Send errors just mean nobody is subscribed.
        let _ = self.events_tx.send(QueueEvent::StatusChanged {
            task_id: row.id,
            root_id: row.root_id,
            status,
        });
        Ok(())
    }

    fn resolve(&self, root_id: TaskId, success: bool) {
        info!(%root_id, success, "task chain resolved");
        let _ = self
            .events_tx
            .send(QueueEvent::ChainResolved { root_id, success });
    }
}
