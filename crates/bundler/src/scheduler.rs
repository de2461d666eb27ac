//! Background task scheduler

use crate::mempool::OperationQueue;
use crate::orchestrator::BundleOrchestrator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Drives bundling ticks and queue cleanup until shutdown
#[derive(Debug, Clone)]
pub struct Scheduler {
    orchestrator: Arc<BundleOrchestrator>,
    queue: Arc<OperationQueue>,
    bundle_interval: Duration,
    cleanup_interval: Duration,
    max_age: Duration,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<BundleOrchestrator>,
        queue: Arc<OperationQueue>,
        bundle_interval: Duration,
        cleanup_interval: Duration,
        max_age: Duration,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            bundle_interval,
            cleanup_interval,
            max_age,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Ticks never overlap and a tick in progress always runs to completion;
    /// cancellation is only observed between ticks.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut bundle_interval = interval(self.bundle_interval);
        bundle_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cleanup_interval = interval(self.cleanup_interval);
        cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            bundle_interval_ms = self.bundle_interval.as_millis() as u64,
            cleanup_interval_secs = self.cleanup_interval.as_secs(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Scheduler stopping");
                    break;
                }
                _ = bundle_interval.tick() => {
                    self.run_bundle_tick().await;
                }
                _ = cleanup_interval.tick() => {
                    self.run_cleanup();
                }
            }
        }
    }

    async fn run_bundle_tick(&self) {
        match self.orchestrator.tick().await {
            Ok(outcome) => {
                if outcome.submitted.is_some()
                    || outcome.confirmed > 0
                    || outcome.released > 0
                    || outcome.dropped > 0
                {
                    info!(
                        submitted = ?outcome.submitted,
                        bundled = outcome.bundled,
                        confirmed = outcome.confirmed,
                        released = outcome.released,
                        dropped = outcome.dropped,
                        "Bundle tick finished"
                    );
                }
            }
            Err(e) => error!("Bundle tick failed: {}", e),
        }
    }

    fn run_cleanup(&self) {
        let removed = self.queue.cleanup_old_ops(self.max_age);
        if removed > 0 {
            info!(removed, remaining = self.queue.len(), "Evicted expired operations");
        } else {
            debug!("Queue cleanup found nothing to evict");
        }
    }
}
