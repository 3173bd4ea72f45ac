//! Offline-tolerant background task queue for Totem Live Accounting.
//!
//! Serializes blockchain extrinsics and chained chat-server RPCs: callers
//! describe deferred work as a [`TaskDescriptor`] (optionally chained via
//! `next`), [`Queue::add`] persists and schedules it, and a single
//! background dispatcher executes one chain at a time against the
//! [`ChainClient`] / [`ChatClient`] collaborators. Every state transition is
//! written through the [`QueueStore`] first, so a session interrupted
//! mid-chain picks up exactly where it left off via [`Queue::resume`].
//!
//! # Example
//!
//! ```rust,ignore
//! let queue = Queue::start(store, chain, chat, QueueConfig::from_env());
//! queue.resume().await?;
//!
//! let task = TaskDescriptor::blockchain(address, "api.tx.projects.addNewProject", args)
//!     .titled("New project", "Register project on chain")
//!     .then(
//!         // runs only if the extrinsic succeeds; slot 0 receives the
//!         // record hash the parent produced
//!         TaskDescriptor::chat("project", vec![json!(null), details, json!(true)])
//!             .inheriting(vec![0]),
//!     );
//! let root = queue.add(task).await?;
//! let success = queue.wait_chain(root).await?;
//! ```

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gate;
pub mod store;
pub mod task;


pub use client::{ChainClient, ChatClient};
pub use config::QueueConfig;
pub use dispatcher::Queue;
pub use error::{ClientError, QueueError, StoreError};
pub use events::QueueEvent;
pub use store::{MemoryStore, QueueStore, SqliteStore, TaskRow, chain_outcome};
pub use task::{TaskDescriptor, TaskId, TaskKind, TaskStatus};
