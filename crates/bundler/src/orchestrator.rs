//! Bundle construction, submission and receipt reconciliation

use crate::mempool::{InFlightBundle, OperationQueue, QueuedOperation};
use alloy::primitives::{Address, B256};
use chrono::Utc;
use config::BundlerConfig;
use ledger_client::LedgerClient;
use signer::BundlerSigner;
use simulator::OperationValidator;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use types::{
    encode_handle_ops, BundlerError, LedgerReceipt, Result, UserOperation, UserOperationHash,
    UserOperationReceipt,
};

/// Tunables for one bundling tick
#[derive(Debug, Clone)]
pub struct BundleSettings {
    pub gas_limit: u64,
    pub receipt_poll_attempts: u32,
    pub receipt_poll_interval: Duration,
    /// In-flight transactions with no receipt after this long are given up on
    pub resubmit_after: Duration,
}

impl From<&BundlerConfig> for BundleSettings {
    fn from(config: &BundlerConfig) -> Self {
        Self {
            gas_limit: config.gas_limit,
            receipt_poll_attempts: config.receipt_poll_attempts,
            receipt_poll_interval: config.receipt_poll_interval(),
            resubmit_after: config.resubmit_after(),
        }
    }
}

/// What a tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Hash of the bundle transaction submitted this tick
    pub submitted: Option<B256>,
    /// Operations included in that transaction
    pub bundled: usize,
    /// Operations confirmed sent, including earlier transactions
    pub confirmed: usize,
    /// Operations made eligible again
    pub released: usize,
    /// Released operations evicted because they no longer simulate
    pub dropped: usize,
}

/// Builds `handleOps` bundles from the queue and tracks them to confirmation
pub struct BundleOrchestrator {
    queue: Arc<OperationQueue>,
    ledger: Arc<dyn LedgerClient>,
    validator: Arc<dyn OperationValidator>,
    signer: BundlerSigner,
    entry_point: Address,
    settings: BundleSettings,
}

impl BundleOrchestrator {
    pub fn new(
        queue: Arc<OperationQueue>,
        ledger: Arc<dyn LedgerClient>,
        validator: Arc<dyn OperationValidator>,
        signer: BundlerSigner,
        entry_point: Address,
        settings: BundleSettings,
    ) -> Self {
        Self {
            queue,
            ledger,
            validator,
            signer,
            entry_point,
            settings,
        }
    }

    /// Bundler address, used as transaction sender and beneficiary
    pub fn bundler_address(&self) -> Address {
        self.signer.address()
    }

    /// Run one bundling cycle.
    ///
    /// Earlier submissions are reconciled first so their operations are not
    /// submitted twice, and released operations are re-simulated before they
    /// are batched again. A ledger error before submission leaves the
    /// remaining operations untouched.
    pub async fn tick(&self) -> Result<TickOutcome> {
        debug!(queued = self.queue.len(), "Bundle tick");
        let mut outcome = self.reconcile_in_flight().await;

        let eligible = self.revalidate(self.queue.eligible(), &mut outcome).await;
        if eligible.is_empty() {
            debug!("No eligible operations");
            return Ok(outcome);
        }

        let ops: Vec<UserOperation> = eligible.iter().map(|entry| entry.op.clone()).collect();
        let beneficiary = self.bundler_address();
        let call_data = encode_handle_ops(&ops, beneficiary);

        let nonce = self.ledger.pending_nonce(beneficiary).await?;
        let gas_price = self.ledger.gas_price().await?;

        let tx = self.signer.call_transaction(
            self.entry_point,
            call_data,
            nonce,
            gas_price,
            self.settings.gas_limit,
        );
        let signed = self.signer.sign(tx)?;
        let tx_hash = self.ledger.send_raw_transaction(&signed.raw).await?;
        if tx_hash != signed.hash {
            warn!(node = %tx_hash, local = %signed.hash, "Node reported a different transaction hash");
        }

        info!(
            tx_hash = %tx_hash,
            operations = ops.len(),
            nonce,
            gas_price,
            "Bundle submitted"
        );

        let mut candidates = HashMap::with_capacity(eligible.len());
        for entry in &eligible {
            if self.queue.set_as_bundled(&entry.key, tx_hash, nonce) {
                self.queue.increment_attempt(&entry.key);
                candidates.insert(entry.op_hash, entry.key.clone());
            }
        }
        outcome.submitted = Some(tx_hash);
        outcome.bundled = candidates.len();

        match self.wait_for_receipt(tx_hash).await {
            Some(receipt) => {
                let (confirmed, released) = self.reconcile(&receipt, candidates);
                outcome.confirmed += confirmed;
                outcome.released += released;
            }
            None => {
                warn!(
                    tx_hash = %tx_hash,
                    attempts = self.settings.receipt_poll_attempts,
                    "Receipt not found, operations stay in flight"
                );
            }
        }

        Ok(outcome)
    }

    /// Check every earlier submission that still has unconfirmed operations.
    ///
    /// Released submissions are checked too: an operation is confirmed by
    /// whichever of its transactions mines with its event. A submission is
    /// dropped once it mines or a later transaction takes its nonce.
    async fn reconcile_in_flight(&self) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        let bundles = self.queue.in_flight();
        if bundles.is_empty() {
            return outcome;
        }

        // Read before any receipt so a nonce below it always has a receipt by now
        let mined_nonce = match self.ledger.latest_nonce(self.bundler_address()).await {
            Ok(nonce) => Some(nonce),
            Err(e) => {
                debug!(error = %e, "Failed to read mined nonce, keeping unmined submissions");
                None
            }
        };

        for bundle in bundles {
            match self.ledger.transaction_receipt(bundle.tx_hash).await {
                Ok(Some(receipt)) => {
                    let candidates = bundle.operations.into_iter().collect();
                    let (confirmed, released) = self.reconcile(&receipt, candidates);
                    outcome.confirmed += confirmed;
                    outcome.released += released;
                }
                Ok(None) if mined_nonce.is_some_and(|mined| bundle.nonce < mined) => {
                    warn!(
                        tx_hash = %bundle.tx_hash,
                        nonce = bundle.nonce,
                        "Submitted bundle was replaced by another transaction"
                    );
                    outcome.released += self.settle(&bundle);
                }
                Ok(None) => {
                    let age = (Utc::now() - bundle.submitted_at).to_std().unwrap_or_default();
                    if age >= self.settings.resubmit_after {
                        let released = bundle
                            .operations
                            .iter()
                            .filter(|(_, key)| self.queue.release(key, bundle.tx_hash))
                            .count();
                        if released > 0 {
                            warn!(
                                tx_hash = %bundle.tx_hash,
                                age_seconds = age.as_secs(),
                                released,
                                "No receipt for submitted bundle, releasing operations"
                            );
                        }
                        outcome.released += released;
                    }
                }
                Err(e) => {
                    warn!(tx_hash = %bundle.tx_hash, error = %e, "Failed to fetch receipt for submitted bundle");
                }
            }
        }

        outcome
    }

    /// Stop tracking `bundle` for every operation it carries
    fn settle(&self, bundle: &InFlightBundle) -> usize {
        bundle
            .operations
            .iter()
            .filter(|(_, key)| self.queue.settle(key, bundle.tx_hash))
            .count()
    }

    /// Re-simulate operations that were submitted before and came back
    /// unconfirmed.
    ///
    /// Operations that now fail are evicted, unless an earlier transaction
    /// carrying them may still mine; those sit out this bundle instead.
    async fn revalidate(
        &self,
        eligible: Vec<QueuedOperation>,
        outcome: &mut TickOutcome,
    ) -> Vec<QueuedOperation> {
        let mut kept = Vec::with_capacity(eligible.len());

        for entry in eligible {
            if entry.attempts == 0 {
                kept.push(entry);
                continue;
            }

            match self.validator.simulate_handle_op(&entry.op).await {
                Ok(()) => kept.push(entry),
                Err(e @ (BundlerError::Simulation(_) | BundlerError::Validation(_))) => {
                    if !entry.submissions.is_empty() {
                        debug!(key = %entry.key, error = %e, "Released operation fails simulation, holding back");
                        continue;
                    }
                    warn!(
                        key = %entry.key,
                        op_hash = %entry.op_hash,
                        attempts = entry.attempts,
                        error = %e,
                        "Released operation no longer simulates, dropping"
                    );
                    if self.queue.remove(&entry.key).is_some() {
                        outcome.dropped += 1;
                    }
                }
                Err(e) => {
                    debug!(key = %entry.key, error = %e, "Could not re-simulate released operation");
                    kept.push(entry);
                }
            }
        }

        kept
    }

    /// Poll for the receipt of `tx_hash` within the configured budget
    async fn wait_for_receipt(&self, tx_hash: B256) -> Option<LedgerReceipt> {
        let attempts = self.settings.receipt_poll_attempts;

        for attempt in 0..attempts {
            match self.ledger.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Some(receipt),
                Ok(None) => {}
                Err(e) => {
                    debug!(tx_hash = %tx_hash, attempt, error = %e, "Receipt poll failed");
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.settings.receipt_poll_interval).await;
            }
        }
        None
    }

    /// Mark every operation with a matching event sent and release the rest.
    ///
    /// Returns `(confirmed, released)`.
    fn reconcile(
        &self,
        receipt: &LedgerReceipt,
        mut candidates: HashMap<UserOperationHash, String>,
    ) -> (usize, usize) {
        if !receipt.status {
            warn!(tx_hash = %receipt.transaction_hash, "Bundle transaction reverted");
        }

        let mut confirmed = 0;
        for decoded in receipt.user_operation_events(self.entry_point) {
            match decoded {
                Ok(decoded) => {
                    let Some(key) = candidates.remove(&decoded.event.userOpHash) else {
                        debug!(
                            op_hash = %decoded.event.userOpHash,
                            "Event for an operation this bundle does not track"
                        );
                        continue;
                    };

                    let op_receipt = UserOperationReceipt::from_event(&decoded.event, receipt);
                    if self.queue.set_as_sent(&key, op_receipt) {
                        confirmed += 1;
                        info!(
                            key = %key,
                            op_hash = %decoded.event.userOpHash,
                            success = decoded.event.success,
                            tx_hash = %receipt.transaction_hash,
                            "User operation confirmed"
                        );
                    }
                }
                Err((log_index, error)) => {
                    warn!(
                        tx_hash = %receipt.transaction_hash,
                        log_index,
                        error = %error,
                        "Undecodable UserOperationEvent"
                    );
                }
            }
        }

        let released = candidates
            .values()
            .filter(|key| self.queue.settle(key, receipt.transaction_hash))
            .count();
        if released > 0 {
            warn!(
                tx_hash = %receipt.transaction_hash,
                released,
                "Operations missing from receipt, releasing"
            );
        }

        (confirmed, released)
    }
}

impl std::fmt::Debug for BundleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleOrchestrator")
            .field("signer", &self.signer)
            .field("validator", &self.validator.name())
            .field("entry_point", &self.entry_point)
            .field("settings", &self.settings)
            .finish()
    }
}
