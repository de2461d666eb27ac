//! Operation admission

use crate::mempool::OperationQueue;
use simulator::OperationValidator;
use tracing::{debug, info};
use types::{Result, UserOperation, UserOperationHash};

/// Validate `op` and enqueue it as pending.
///
/// When `inject_init_code` is set, undeployed senders get the factory
/// `initCode` before simulation. Returns the admission key.
pub async fn process_user_operation(
    validator: &dyn OperationValidator,
    queue: &OperationQueue,
    op: UserOperation,
    op_hash: UserOperationHash,
    inject_init_code: bool,
) -> Result<String> {
    let op = if inject_init_code {
        validator.ensure_account_initialized(op).await?
    } else {
        op
    };

    debug!(
        sender = %op.sender,
        nonce = %op.nonce,
        validator = validator.name(),
        "Simulating user operation"
    );
    validator.simulate_handle_op(&op).await?;

    let key = queue.add(op, op_hash)?;
    info!(key = %key, op_hash = %op_hash, "User operation admitted");
    Ok(key)
}
