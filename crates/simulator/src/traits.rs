//! Admission validator traits

use async_trait::async_trait;
use types::{Result, UserOperation};

/// Gate applied to every operation before it enters the queue.
///
/// Implementations never touch the queue; they only read the ledger.
#[async_trait]
pub trait OperationValidator: Send + Sync {
    /// Check the gas floor, then simulate a one-operation `handleOps` call
    async fn simulate_handle_op(&self, op: &UserOperation) -> Result<()>;

    /// Check `preVerificationGas` against the computed floor
    fn validate_pre_verification_gas(&self, op: &UserOperation) -> Result<()>;

    /// Return `op` with `initCode` filled in when its sender has no code yet
    async fn ensure_account_initialized(&self, op: UserOperation) -> Result<UserOperation>;

    /// Name used in logs
    fn name(&self) -> &str;
}
