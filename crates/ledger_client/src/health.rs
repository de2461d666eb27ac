//! Ledger health probing

use crate::client::LedgerClient;
use std::time::Instant;

/// Result of a single ledger probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerHealth {
    pub healthy: bool,
    /// Chain ID reported by the node, when it answered
    pub chain_id: Option<u64>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Ask the node for its chain ID and compare it with the configured one
pub async fn probe(ledger: &dyn LedgerClient, expected_chain_id: u64) -> LedgerHealth {
    let start = Instant::now();
    let result = ledger.chain_id().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(chain_id) if chain_id == expected_chain_id => LedgerHealth {
            healthy: true,
            chain_id: Some(chain_id),
            latency_ms,
            error: None,
        },
        Ok(chain_id) => {
            tracing::warn!(expected_chain_id, chain_id, "Ledger reports a different chain ID");
            LedgerHealth {
                healthy: false,
                chain_id: Some(chain_id),
                latency_ms,
                error: Some(format!(
                    "chain ID mismatch: expected {}, node reports {}",
                    expected_chain_id, chain_id
                )),
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ledger health probe failed");
            LedgerHealth {
                healthy: false,
                chain_id: None,
                latency_ms,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLedger;

    #[tokio::test]
    async fn test_probe_matching_chain() {
        let ledger = MockLedger::new(196);
        let health = probe(&ledger, 196).await;
        assert!(health.healthy);
        assert_eq!(health.chain_id, Some(196));
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_chain_mismatch() {
        let ledger = MockLedger::new(1);
        let health = probe(&ledger, 196).await;
        assert!(!health.healthy);
        assert_eq!(health.chain_id, Some(1));
        assert!(health.error.unwrap().contains("mismatch"));
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let ledger = MockLedger::new(196);
        ledger.set_unreachable(true);
        let health = probe(&ledger, 196).await;
        assert!(!health.healthy);
        assert!(health.chain_id.is_none());
    }
}
