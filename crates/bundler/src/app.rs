//! Main application structure and lifecycle management

use crate::{
    api::ApiServer,
    mempool::OperationQueue,
    orchestrator::{BundleOrchestrator, BundleSettings},
    scheduler::Scheduler,
};
use alloy::primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use config::Config;
use ledger_client::{probe, AlloyLedgerClient, LedgerClient};
use signer::BundlerSigner;
use simulator::{EntryPointSimulator, OperationValidator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// State shared by the HTTP handlers
pub struct AppState {
    pub config: Config,
    pub queue: Arc<OperationQueue>,
    pub validator: Arc<dyn OperationValidator>,
    pub ledger: Arc<dyn LedgerClient>,
    pub bundler_address: Address,
    pub entry_point: Address,
    pub chain_id: u64,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("chain_id", &self.chain_id)
            .field("entry_point", &self.entry_point)
            .field("bundler_address", &self.bundler_address)
            .field("queue_len", &self.queue.len())
            .finish()
    }
}

/// Main application that coordinates all components
pub struct Application {
    state: Arc<AppState>,
    api_server: ApiServer,
    scheduler: Scheduler,
    shutdown: CancellationToken,
}

impl Application {
    /// Connect to the configured node and build every component
    pub async fn new(config: Config) -> Result<Self> {
        let ledger = AlloyLedgerClient::new(&config.network.rpc_url, config.rpc_timeout())
            .context("Failed to create ledger client")?;
        Self::with_ledger(config, Arc::new(ledger)).await
    }

    /// Build the application on top of an existing ledger client.
    ///
    /// Fails if the signer key is unusable, the configured bundler address
    /// does not match it, or the node reports a different chain.
    pub async fn with_ledger(config: Config, ledger: Arc<dyn LedgerClient>) -> Result<Self> {
        info!("Initializing application components...");

        let chain_id = config.network.chain_id;
        let entry_point = config.entry_point().map_err(|e| anyhow!(e))?;
        let factory = config.factory().map_err(|e| anyhow!(e))?;

        let signer = BundlerSigner::new(&config.signer.private_key, chain_id)
            .context("Failed to load bundler key")?;
        let configured = config.bundler_address().map_err(|e| anyhow!(e))?;
        signer
            .ensure_address(configured)
            .context("Bundler key does not match signer.bundler_address")?;
        let bundler_address = signer.address();

        let health = probe(ledger.as_ref(), chain_id).await;
        if !health.healthy {
            bail!(
                "Ledger at {} is not usable: {}",
                config.network.redacted_rpc_url(),
                health.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        info!(chain_id, latency_ms = health.latency_ms, "Connected to ledger");

        let queue = Arc::new(OperationQueue::new());
        let validator: Arc<dyn OperationValidator> = Arc::new(EntryPointSimulator::new(
            ledger.clone(),
            entry_point,
            factory,
            bundler_address,
            config.validator.simulation_gas_limit,
        ));

        let orchestrator = BundleOrchestrator::new(
            queue.clone(),
            ledger.clone(),
            validator.clone(),
            signer,
            entry_point,
            BundleSettings::from(&config.bundler),
        );
        let scheduler = Scheduler::new(
            Arc::new(orchestrator),
            queue.clone(),
            config.bundler.interval(),
            config.queue.cleanup_interval(),
            config.queue.max_age(),
        );

        let state = Arc::new(AppState {
            config,
            queue,
            validator,
            ledger,
            bundler_address,
            entry_point,
            chain_id,
        });

        let api_server = ApiServer::new(state.clone()).context("Failed to create API server")?;

        info!(
            bundler = %bundler_address,
            entry_point = %entry_point,
            "Application components initialized successfully"
        );

        Ok(Self {
            state,
            api_server,
            scheduler,
            shutdown: CancellationToken::new(),
        })
    }

    /// Run the scheduler and API server until shutdown
    pub async fn run(&self) -> Result<()> {
        info!("Starting application services...");

        let scheduler_handle = {
            let scheduler = self.scheduler.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { scheduler.run(shutdown).await })
        };
        info!("Background scheduler started");

        let served = self.api_server.run(self.shutdown.clone()).await;

        // Stop the scheduler even if the server failed
        self.shutdown.cancel();
        scheduler_handle.await.context("Scheduler task error")?;
        served.context("API server error")?;

        info!("Application stopped");
        Ok(())
    }

    /// Token that stops the application when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_client::mock::MockLedger;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> Config {
        let mut config = Config::default();
        config.network.chain_id = 196;
        config.server.port = 0;
        config
    }

    #[tokio::test]
    async fn test_builds_with_matching_chain() {
        let app = Application::with_ledger(config(), Arc::new(MockLedger::new(196)))
            .await
            .unwrap();
        let state = app.state();
        assert_eq!(state.chain_id, 196);
        assert!(state.queue.is_empty());
        assert_eq!(
            state.bundler_address.to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[tokio::test]
    async fn test_chain_mismatch_is_fatal() {
        let err = Application::with_ledger(config(), Arc::new(MockLedger::new(1)))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("chain ID mismatch"));
    }

    #[tokio::test]
    async fn test_bundler_address_mismatch_is_fatal() {
        let mut config = config();
        config.signer.bundler_address = Some("0x000000000000000000000000000000000000dEaD".to_string());

        let result = Application::with_ledger(config, Arc::new(MockLedger::new(196))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_node_is_fatal() {
        let ledger = MockLedger::new(196);
        ledger.set_unreachable(true);
        assert!(Application::with_ledger(config(), Arc::new(ledger)).await.is_err());
    }

    #[tokio::test]
    async fn test_new_probes_rpc_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_chainId"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "result": "0xc4"
            })))
            .mount(&server)
            .await;

        let mut config = config();
        config.network.rpc_url = server.uri();
        assert!(Application::new(config.clone()).await.is_ok());

        config.network.chain_id = 1;
        assert!(Application::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let app = Application::with_ledger(config(), Arc::new(MockLedger::new(196)))
            .await
            .unwrap();
        let token = app.shutdown_token();

        let handle = tokio::spawn(async move { app.run().await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
