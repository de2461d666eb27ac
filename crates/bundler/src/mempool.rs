//! In-memory operation queue

use alloy::primitives::B256;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use types::{OperationState, QueueError, UserOperation, UserOperationHash, UserOperationReceipt};

/// A bundle transaction an operation was submitted in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub tx_hash: B256,
    /// Bundler account nonce the transaction was signed with
    pub nonce: u64,
    pub submitted_at: DateTime<Utc>,
}

/// An admitted operation and its lifecycle bookkeeping
#[derive(Debug, Clone)]
pub struct QueuedOperation {
    /// `sender:nonce` admission key
    pub key: String,
    pub op: UserOperation,
    /// Client-supplied hash, used for receipt lookup and event correlation
    pub op_hash: UserOperationHash,
    pub admitted_at: DateTime<Utc>,
    /// Number of bundle transactions this operation was submitted in
    pub attempts: u32,
    pub state: OperationState,
    pub receipt: Option<UserOperationReceipt>,
    /// Latest submission the operation is waiting on; `None` once released
    pub in_flight: Option<InFlight>,
    /// Every submission that has neither mined nor been superseded.
    /// Releasing an operation does not clear this, so an earlier
    /// transaction that mines late still confirms it.
    pub submissions: Vec<InFlight>,
}

impl QueuedOperation {
    /// Whether the next bundle may include this operation
    pub fn is_eligible(&self) -> bool {
        self.state != OperationState::Sent && self.in_flight.is_none()
    }
}

/// A submitted bundle transaction and the queue keys it carries
#[derive(Debug, Clone)]
pub struct InFlightBundle {
    pub tx_hash: B256,
    pub nonce: u64,
    pub submitted_at: DateTime<Utc>,
    /// `(op_hash, key)` of every operation still waiting on this transaction
    pub operations: Vec<(UserOperationHash, String)>,
}

/// Number of queued operations per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub bundled: usize,
    pub sent: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.pending + self.bundled + self.sent
    }
}

/// Operation queue keyed by `sender:nonce`.
///
/// Every method takes the lock once, so each call is atomic with respect to
/// concurrent admissions, bundling ticks and receipt lookups.
#[derive(Debug, Default)]
pub struct OperationQueue {
    ops: Mutex<HashMap<String, QueuedOperation>>,
}

impl OperationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `op` in the pending state. The first admission for a key wins.
    pub fn add(&self, op: UserOperation, op_hash: UserOperationHash) -> Result<String, QueueError> {
        let key = op.admission_key();
        let mut ops = self.ops.lock();

        if ops.contains_key(&key) {
            return Err(QueueError::Duplicate { key });
        }

        ops.insert(
            key.clone(),
            QueuedOperation {
                key: key.clone(),
                op,
                op_hash,
                admitted_at: Utc::now(),
                attempts: 0,
                state: OperationState::Pending,
                receipt: None,
                in_flight: None,
                submissions: Vec::new(),
            },
        );
        Ok(key)
    }

    /// Snapshot of the entry whose client hash is `op_hash`
    pub fn get_by_hash(&self, op_hash: &UserOperationHash) -> Result<QueuedOperation, QueueError> {
        self.ops
            .lock()
            .values()
            .find(|entry| entry.op_hash == *op_hash)
            .cloned()
            .ok_or_else(|| QueueError::NotFound {
                op_hash: op_hash.to_string(),
            })
    }

    /// Snapshot of every entry, oldest admission first
    pub fn get_all(&self) -> Vec<QueuedOperation> {
        let mut all: Vec<QueuedOperation> = self.ops.lock().values().cloned().collect();
        all.sort_by(|a, b| a.admitted_at.cmp(&b.admitted_at).then_with(|| a.key.cmp(&b.key)));
        all
    }

    /// Entries the next bundle may include, oldest admission first
    pub fn eligible(&self) -> Vec<QueuedOperation> {
        let mut eligible: Vec<QueuedOperation> = self
            .ops
            .lock()
            .values()
            .filter(|entry| entry.is_eligible())
            .cloned()
            .collect();
        eligible.sort_by(|a, b| a.admitted_at.cmp(&b.admitted_at).then_with(|| a.key.cmp(&b.key)));
        eligible
    }

    /// Submitted transactions that still have unconfirmed operations,
    /// including ones their operations were released from
    pub fn in_flight(&self) -> Vec<InFlightBundle> {
        let ops = self.ops.lock();
        let mut bundles: HashMap<B256, InFlightBundle> = HashMap::new();

        for entry in ops.values().filter(|entry| entry.state != OperationState::Sent) {
            for submission in &entry.submissions {
                bundles
                    .entry(submission.tx_hash)
                    .or_insert_with(|| InFlightBundle {
                        tx_hash: submission.tx_hash,
                        nonce: submission.nonce,
                        submitted_at: submission.submitted_at,
                        operations: Vec::new(),
                    })
                    .operations
                    .push((entry.op_hash, entry.key.clone()));
            }
        }

        let mut bundles: Vec<InFlightBundle> = bundles.into_values().collect();
        bundles.sort_by_key(|bundle| (bundle.submitted_at, bundle.nonce));
        bundles
    }

    pub fn remove(&self, key: &str) -> Option<QueuedOperation> {
        self.ops.lock().remove(key)
    }

    pub fn increment_attempt(&self, key: &str) {
        if let Some(entry) = self.ops.lock().get_mut(key) {
            entry.attempts += 1;
        }
    }

    /// Record that `key` was submitted in `tx_hash`, signed with `nonce`.
    ///
    /// Returns false if the entry is gone or already sent.
    pub fn set_as_bundled(&self, key: &str, tx_hash: B256, nonce: u64) -> bool {
        let mut ops = self.ops.lock();
        match ops.get_mut(key) {
            Some(entry) if entry.state != OperationState::Sent => {
                let submission = InFlight {
                    tx_hash,
                    nonce,
                    submitted_at: Utc::now(),
                };
                entry.state = OperationState::Bundled;
                entry.submissions.retain(|s| s.tx_hash != tx_hash);
                entry.submissions.push(submission.clone());
                entry.in_flight = Some(submission);
                true
            }
            _ => false,
        }
    }

    /// Make `key` eligible for the next bundle again if it is waiting on
    /// `tx_hash`. The state and the submission history stay where they are.
    pub fn release(&self, key: &str, tx_hash: B256) -> bool {
        let mut ops = self.ops.lock();
        match ops.get_mut(key) {
            Some(entry) if entry.in_flight.as_ref().is_some_and(|f| f.tx_hash == tx_hash) => {
                entry.in_flight = None;
                true
            }
            _ => false,
        }
    }

    /// Forget `tx_hash` for `key` once it mined without confirming the
    /// operation or can no longer mine. Returns true if this released it.
    pub fn settle(&self, key: &str, tx_hash: B256) -> bool {
        let mut ops = self.ops.lock();
        let Some(entry) = ops.get_mut(key) else {
            return false;
        };
        entry.submissions.retain(|s| s.tx_hash != tx_hash);
        if entry.in_flight.as_ref().is_some_and(|f| f.tx_hash == tx_hash) {
            entry.in_flight = None;
            return true;
        }
        false
    }

    /// Mark `key` confirmed and attach its receipt. Sent is terminal.
    pub fn set_as_sent(&self, key: &str, receipt: UserOperationReceipt) -> bool {
        let mut ops = self.ops.lock();
        match ops.get_mut(key) {
            Some(entry) if entry.state != OperationState::Sent => {
                entry.state = OperationState::Sent;
                entry.receipt = Some(receipt);
                entry.in_flight = None;
                entry.submissions.clear();
                true
            }
            _ => false,
        }
    }

    /// Evict entries admitted more than `max_age` ago
    pub fn cleanup_old_ops(&self, max_age: Duration) -> usize {
        let max_age = ChronoDuration::from_std(max_age).unwrap_or(ChronoDuration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.cleanup_admitted_before(cutoff)
    }

    /// Evict entries admitted strictly before `cutoff`
    pub fn cleanup_admitted_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut ops = self.ops.lock();
        let before = ops.len();
        ops.retain(|_, entry| entry.admitted_at >= cutoff);
        before - ops.len()
    }

    /// Drop every entry and return how many there were
    pub fn clear(&self) -> usize {
        let mut ops = self.ops.lock();
        let count = ops.len();
        ops.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.ops.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.lock().is_empty()
    }

    pub fn counts(&self) -> QueueCounts {
        self.ops
            .lock()
            .values()
            .fold(QueueCounts::default(), |mut counts, entry| {
                match entry.state {
                    OperationState::Pending => counts.pending += 1,
                    OperationState::Bundled => counts.bundled += 1,
                    OperationState::Sent => counts.sent += 1,
                }
                counts
            })
    }
}
