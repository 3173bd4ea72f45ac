use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::QueueError;

/// Unique identifier for a queued task (one link of a chain).
///
/// The first link's id doubles as the chain's root id.
pub type TaskId = Uuid;

/// Which external collaborator a task targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
    /// An extrinsic submitted through the chain client, gated on the signing
    /// account's free balance.
    Blockchain,
    /// A request/response RPC on the chat/notification server.
    ChatClient,
}

/// High-level lifecycle state of one link, as persisted by the store.
///
/// `Pending → Dispatched → (Succeeded | Failed)` for the root link; child
/// links start out `Blocked` and become `Pending` work only once their parent
/// succeeds, or `Skipped` when any earlier link fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted and persisted, not yet started.
    Pending,
    /// Waiting on the parent link to succeed.
    Blocked,
    /// Handed to the chain or chat client; a restart re-runs links stuck here.
    Dispatched,
    /// Completed; the remote's result value is recorded on the row.
    Succeeded,
    /// The client reported an error, or a precondition failed.
    Failed,
    /// Never ran because an earlier link in the chain failed.
    Skipped,
}

impl TaskStatus {
    /// Returns `true` once the link can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// One unit of deferred work, optionally chained to a dependent follow-up.
///
/// Built by UI-level callers at submit time and handed to
/// [`Queue::add`](crate::dispatcher::Queue::add); everything needed to execute
/// later (possibly after a restart) is carried inline, so the descriptor is
/// fully serializable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    /// Signing account whose free balance gates execution.
    /// Required for [`TaskKind::Blockchain`], unused otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Remote function to invoke, e.g. `"api.tx.timekeeping.submitTime"`
    /// (blockchain) or `"notify"` (chat server).
    pub func: String,
    /// Positional arguments forwarded to `func`.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Short human-readable label for progress display.
    #[serde(default)]
    pub title: String,
    /// Longer human-readable label for progress display.
    #[serde(default)]
    pub description: String,
    /// Minimum free balance this extrinsic needs. Falls back to
    /// [`QueueConfig::min_balance`](crate::config::QueueConfig::min_balance)
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_funds: Option<u64>,
    /// Arg slots overwritten with the parent link's result before dispatch
    /// (e.g. a record hash produced by the parent). Meaningless on the root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherit: Vec<usize>,
    /// Dependent task dispatched only if this link succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Box<TaskDescriptor>>,
}

impl TaskDescriptor {
    /// A blockchain task signed by `address`.
    pub fn blockchain(
        address: impl Into<String>,
        func: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            kind: TaskKind::Blockchain,
            address: Some(address.into()),
            func: func.into(),
            args,
            title: String::new(),
            description: String::new(),
            required_funds: None,
            inherit: Vec::new(),
            next: None,
        }
    }

    /// A chat-server RPC task.
    pub fn chat(func: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            kind: TaskKind::ChatClient,
            address: None,
            func: func.into(),
            args,
            title: String::new(),
            description: String::new(),
            required_funds: None,
            inherit: Vec::new(),
            next: None,
        }
    }

    /// Set the progress-display labels.
    pub fn titled(mut self, title: impl Into<String>, description: impl Into<String>) -> Self {
        self.title = title.into();
        self.description = description.into();
        self
    }

    /// Set an explicit balance requirement for this link.
    pub fn requiring(mut self, funds: u64) -> Self {
        self.required_funds = Some(funds);
        self
    }

    /// Declare which of this link's arg slots take the parent link's result.
    pub fn inheriting(mut self, slots: Vec<usize>) -> Self {
        self.inherit = slots;
        self
    }

    /// Append `next` at the tail of this chain.
    pub fn then(mut self, next: TaskDescriptor) -> Self {
        self.next = Some(Box::new(match self.next.take() {
            Some(tail) => (*tail).then(next),
            None => next,
        }));
        self
    }

    /// Number of links in this chain, including `self`.
    pub fn chain_len(&self) -> usize {
        let mut len = 0;
        let mut link = Some(self);
        while let Some(task) = link {
            len += 1;
            link = task.next.as_deref();
        }
        len
    }

    /// Reject descriptors the dispatcher could never execute.
    ///
    /// Checked once at enqueue time so malformed tasks fail loudly instead of
    /// being silently dropped by the dispatcher.
    pub fn validate(&self, max_chain_depth: usize) -> Result<(), QueueError> {
        let mut depth = 0usize;
        let mut link = Some(self);
        while let Some(task) = link {
            depth += 1;
            if depth > max_chain_depth {
                return Err(QueueError::MalformedTask(format!(
                    "chain exceeds {max_chain_depth} links"
                )));
            }
            if task.func.trim().is_empty() {
                return Err(QueueError::MalformedTask(format!(
                    "link {} has an empty func",
                    depth - 1
                )));
            }
            if task.kind == TaskKind::Blockchain
                && task.address.as_deref().is_none_or(|a| a.trim().is_empty())
            {
                return Err(QueueError::MalformedTask(format!(
                    "blockchain link '{}' is missing a signing address",
                    task.func
                )));
            }
            if depth == 1 && !task.inherit.is_empty() {
                return Err(QueueError::MalformedTask(
                    "root link cannot inherit args; it has no parent".to_owned(),
                ));
            }
            if let Some(&slot) = task.inherit.iter().find(|&&s| s >= task.args.len()) {
                return Err(QueueError::MalformedTask(format!(
                    "link '{}' inherits into slot {slot} but only has {} args",
                    task.func,
                    task.args.len()
                )));
            }
            link = task.next.as_deref();
        }
        Ok(())
    }
}
