//! Entry point simulation engine

use crate::traits::OperationValidator;
use crate::validation::GasOverheads;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolError;
use async_trait::async_trait;
use ledger_client::{CallRequest, LedgerClient};
use std::sync::Arc;
use types::entry_point::IEntryPoint::{FailedOp, FailedOpWithRevert};
use types::{account_init_code, encode_handle_ops, BundlerError, LedgerError, Result, UserOperation};

/// Marker the entry point puts in front of protocol-level failures
const FAILED_OP_MARKER: &str = "FailedOp";

/// Validator that simulates `handleOps` through the ledger
#[derive(Clone)]
pub struct EntryPointSimulator {
    ledger: Arc<dyn LedgerClient>,
    entry_point: Address,
    factory: Address,
    /// Bundler address, used as caller and beneficiary
    beneficiary: Address,
    simulation_gas_limit: u64,
    overheads: GasOverheads,
}

impl EntryPointSimulator {
    /// Create a new simulator
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        entry_point: Address,
        factory: Address,
        beneficiary: Address,
        simulation_gas_limit: u64,
    ) -> Self {
        Self {
            ledger,
            entry_point,
            factory,
            beneficiary,
            simulation_gas_limit,
            overheads: GasOverheads::default(),
        }
    }

    pub fn with_overheads(mut self, overheads: GasOverheads) -> Self {
        self.overheads = overheads;
        self
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }
}

impl std::fmt::Debug for EntryPointSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPointSimulator")
            .field("entry_point", &self.entry_point)
            .field("factory", &self.factory)
            .field("beneficiary", &self.beneficiary)
            .field("simulation_gas_limit", &self.simulation_gas_limit)
            .finish()
    }
}

#[async_trait]
impl OperationValidator for EntryPointSimulator {
    async fn simulate_handle_op(&self, op: &UserOperation) -> Result<()> {
        self.validate_pre_verification_gas(op)?;

        let request = CallRequest {
            from: self.beneficiary,
            to: self.entry_point,
            data: encode_handle_ops(std::slice::from_ref(op), self.beneficiary),
            gas: self.simulation_gas_limit,
        };

        match self.ledger.call(&request).await {
            Ok(_) => Ok(()),
            Err(LedgerError::Revert { message, data }) => {
                let error = simulation_error(&message, data.as_ref());
                tracing::debug!(sender = %op.sender, error = %error, "Simulation reverted");
                Err(error)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn validate_pre_verification_gas(&self, op: &UserOperation) -> Result<()> {
        self.overheads.validate(op, self.beneficiary)?;
        Ok(())
    }

    async fn ensure_account_initialized(&self, mut op: UserOperation) -> Result<UserOperation> {
        if op.has_init_code() {
            return Ok(op);
        }

        let code = self.ledger.code_at(op.sender).await?;
        if code.is_empty() {
            tracing::info!(sender = %op.sender, factory = %self.factory, "Sender not deployed, injecting initCode");
            op.init_code = account_init_code(self.factory, op.sender);
        }
        Ok(op)
    }

    fn name(&self) -> &str {
        "entry_point"
    }
}

/// Build the simulation error for a reverted `handleOps` call.
///
/// Decodable `FailedOp`/`FailedOpWithRevert` payloads are rendered directly;
/// otherwise the node's message is cut to start at the `FailedOp` marker.
pub fn simulation_error(message: &str, data: Option<&Bytes>) -> BundlerError {
    if let Some(reason) = data.and_then(|d| decode_failed_op(d)) {
        return BundlerError::Simulation(format!("simulate failed with EntryPoint revert: {}", reason));
    }

    if let Some(reason) = extract_revert_reason(message) {
        return BundlerError::Simulation(format!("simulate failed with EntryPoint revert: {}", reason));
    }

    match data {
        Some(data) if !data.is_empty() => {
            BundlerError::Simulation(format!("simulate failed: {} (data: {})", message, data))
        }
        _ => BundlerError::Simulation(format!("simulate failed: {}", message)),
    }
}

/// Render a `FailedOp` or `FailedOpWithRevert` revert payload
pub fn decode_failed_op(data: &[u8]) -> Option<String> {
    if let Ok(err) = FailedOp::abi_decode(data, true) {
        return Some(format!("FailedOp({}, \"{}\")", err.opIndex, err.reason));
    }
    if let Ok(err) = FailedOpWithRevert::abi_decode(data, true) {
        return Some(format!(
            "FailedOpWithRevert({}, \"{}\", {})",
            err.opIndex, err.reason, err.inner
        ));
    }
    None
}

/// Slice of `message` starting at the `FailedOp` marker
pub fn extract_revert_reason(message: &str) -> Option<&str> {
    message.find(FAILED_OP_MARKER).map(|start| &message[start..])
}
