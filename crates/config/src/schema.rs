//! Configuration schema definitions

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger network configuration
    pub network: NetworkConfig,
    /// Contract addresses
    pub contracts: ContractsConfig,
    /// Bundler key material
    pub signer: SignerConfig,
    /// Bundling loop configuration
    #[serde(default)]
    pub bundler: BundlerConfig,
    /// Operation queue hygiene
    #[serde(default)]
    pub queue: QueueConfig,
    /// Admission validator configuration
    #[serde(default)]
    pub validator: ValidatorConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Chain ID used for signing and reported by `getChainId`
    pub chain_id: u64,
    /// Ledger JSON-RPC URL
    pub rpc_url: String,
    /// Deadline applied to every ledger call
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_seconds: u64,
}

/// Contract addresses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// ERC-4337 entry point
    pub entry_point: String,
    /// Account factory used for sender deployment
    pub factory: String,
}

/// Signer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Hex-encoded secp256k1 private key
    pub private_key: String,
    /// Expected bundler address; must match the key when set
    #[serde(default)]
    pub bundler_address: Option<String>,
}

/// Bundling loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlerConfig {
    /// Seconds between bundling ticks
    #[serde(default = "default_bundle_interval")]
    pub interval_seconds: u64,
    /// Gas limit of every bundle transaction
    #[serde(default = "default_bundle_gas_limit")]
    pub gas_limit: u64,
    /// Receipt polls per submitted transaction
    #[serde(default = "default_receipt_poll_attempts")]
    pub receipt_poll_attempts: u32,
    /// Delay between receipt polls in milliseconds
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
    /// Age after which an unconfirmed transaction's operations are released
    #[serde(default = "default_resubmit_after")]
    pub resubmit_after_seconds: u64,
}

/// Queue hygiene configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Operations older than this are evicted
    #[serde(default = "default_max_age")]
    pub max_age_seconds: u64,
    /// Seconds between eviction sweeps
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

/// Admission validator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Gas supplied to the `handleOps` simulation call
    #[serde(default = "default_simulation_gas_limit")]
    pub simulation_gas_limit: u64,
    /// Fill `initCode` for senders without deployed code
    #[serde(default = "default_false")]
    pub inject_init_code: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_rpc_timeout() -> u64 {
    10
}

fn default_bundle_interval() -> u64 {
    3
}

fn default_bundle_gas_limit() -> u64 {
    8_000_000
}

fn default_receipt_poll_attempts() -> u32 {
    40
}

fn default_receipt_poll_interval_ms() -> u64 {
    100
}

fn default_resubmit_after() -> u64 {
    30
}

fn default_max_age() -> u64 {
    3600 // 1 hour
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_simulation_gas_limit() -> u64 {
    15_000_000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8181
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1024 * 1024 // 1MB
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:8080".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Parsed entry point address
    pub fn entry_point(&self) -> Result<Address, String> {
        parse_address("contracts.entry_point", &self.contracts.entry_point)
    }

    /// Parsed factory address
    pub fn factory(&self) -> Result<Address, String> {
        parse_address("contracts.factory", &self.contracts.factory)
    }

    /// Parsed expected bundler address, if configured
    pub fn bundler_address(&self) -> Result<Option<Address>, String> {
        self.signer
            .bundler_address
            .as_deref()
            .map(|addr| parse_address("signer.bundler_address", addr))
            .transpose()
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.network.rpc_timeout_seconds)
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, String> {
    types::utils::parse_address(value).ok_or_else(|| format!("Invalid {}: {}", field, value))
}

impl NetworkConfig {
    /// `rpc_url` cut down to scheme, host and port for logging.
    ///
    /// Hosted RPC URLs carry API keys in the path, query or userinfo.
    pub fn redacted_rpc_url(&self) -> String {
        let Some((scheme, rest)) = self.rpc_url.split_once("://") else {
            return "<redacted>".to_string();
        };
        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        format!("{}://{}", scheme, host)
    }
}

impl BundlerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }

    pub fn resubmit_after(&self) -> Duration {
        Duration::from_secs(self.resubmit_after_seconds)
    }
}

impl QueueConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: 31337,
                rpc_url: "http://127.0.0.1:8545".to_string(),
                rpc_timeout_seconds: default_rpc_timeout(),
            },
            contracts: ContractsConfig {
                // Canonical v0.7 entry point deployment
                entry_point: "0x0000000071727De22E5E9d8BAf0edAc6f37da032".to_string(),
                factory: "0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985".to_string(),
            },
            signer: SignerConfig {
                // Well-known development key (anvil account 0), never use on a live network
                private_key: "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"
                    .to_string(),
                bundler_address: None,
            },
            bundler: BundlerConfig::default(),
            queue: QueueConfig::default(),
            validator: ValidatorConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_bundle_interval(),
            gas_limit: default_bundle_gas_limit(),
            receipt_poll_attempts: default_receipt_poll_attempts(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            resubmit_after_seconds: default_resubmit_after(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_age_seconds: default_max_age(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            simulation_gas_limit: default_simulation_gas_limit(),
            inject_init_code: default_false(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
            max_body_size: default_max_body_size(),
            cors_enabled: default_true(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
