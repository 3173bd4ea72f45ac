//! Balance precondition gate for blockchain tasks.

use crate::client::ChainClient;
use crate::error::QueueError;

/// Verify that `address` can fund an extrinsic needing `required` units.
///
/// Queries the chain client's free balance and fails with
/// [`QueueError::InsufficientBalance`] when it falls short, so the extrinsic
/// is never submitted and no nonce is consumed. A balance exactly equal to
/// `required` passes.
pub async fn check_funds(
    chain: &dyn ChainClient,
    address: &str,
    required: u64,
) -> Result<(), QueueError> {
    let free = chain.free_balance(address).await?;
    if free < required {
        return Err(QueueError::InsufficientBalance {
            address: address.to_owned(),
            free,
            required,
        });
    }
    Ok(())
}
