//! The queue's two external collaborators, behind traits so that real
//! transports (a Substrate RPC connection, a Socket.IO session) and test
//! mocks are interchangeable `Arc<dyn …>` objects.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;

/// Blockchain node client.
///
/// The queue depends on exactly two capabilities: a balance query for the
/// precondition gate, and extrinsic submission returning the finalized
/// result (conventionally a block or record hash) as JSON.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current free balance of `address`, in the chain's smallest unit.
    async fn free_balance(&self, address: &str) -> Result<u64, ClientError>;

    /// Sign and submit the extrinsic named by `func` (e.g.
    /// `"api.tx.projects.addNewProject"`) with positional `args`, signed by
    /// `signer`. Resolves once the extrinsic is finalized or rejected.
    async fn submit(&self, signer: &str, func: &str, args: &[Value])
    -> Result<Value, ClientError>;
}

/// Chat/notification server client: request/response RPCs over a persistent
/// socket (`register`, `notify`, `project`, …).
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Invoke the named server method with positional `args`.
    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, ClientError>;
}
