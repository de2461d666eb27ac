//! ERC-4337 Bundler - Main Application Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use std::env;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod admission;
mod api;
mod app;
mod mempool;
mod orchestrator;
mod scheduler;

use app::Application;

/// ERC-4337 bundler for packed user operations
#[derive(Debug, Parser)]
#[command(name = "bundler", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_result = dotenv::dotenv();
    let cli = Cli::parse();

    let config = ConfigLoader::load(&cli.config).context("Failed to load configuration")?;

    init_logging(&config.logging)?;

    match dotenv_result {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(e) if !e.not_found() => warn!("Could not load .env file: {}", e),
        Err(_) => {}
    }

    info!("Starting Bundler v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from: {}", cli.config);
    log_config_summary(&config);

    let app = Application::new(config)
        .await
        .context("Failed to create application")?;

    let shutdown = app.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to install CTRL+C signal handler: {}", e),
        }
    });

    info!("Application starting...");
    if let Err(e) = app.run().await {
        error!("Application error: {:#}", e);
        return Err(e);
    }

    info!("Bundler shutdown complete");
    Ok(())
}

/// Initialize logging from config; `RUST_LOG` and `LOG_FORMAT` take precedence
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| logging.level.clone());
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let env_filter = tracing_subscriber::EnvFilter::try_new(&log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format.as_str() {
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize pretty logging")?;
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to initialize JSON logging")?;
        }
    }

    info!("Logging initialized");
    info!("Log level: {}", log_level);
    info!("Log format: {}", log_format);

    if log_level == "trace" || log_level == "debug" {
        warn!("Debug/trace logging enabled - may impact performance in production");
    }

    Ok(())
}

fn log_config_summary(config: &Config) {
    info!("Chain ID: {}", config.network.chain_id);
    info!("RPC URL: {}", config.network.redacted_rpc_url());
    info!("Entry point: {}", config.contracts.entry_point);
    info!("Account factory: {}", config.contracts.factory);
    info!(
        "Bundle interval: {}s, gas limit: {}",
        config.bundler.interval_seconds, config.bundler.gas_limit
    );
    info!(
        "Queue max age: {}s, cleanup every {}s",
        config.queue.max_age_seconds, config.queue.cleanup_interval_seconds
    );
    if config.validator.inject_init_code {
        info!("initCode injection enabled for undeployed senders");
    }

    match ConfigValidator::validate(config) {
        Ok(report) => {
            for warning in &report.warnings {
                warn!("Configuration warning: {}: {}", warning.field, warning.message);
            }
        }
        Err(e) => warn!("Configuration validation failed: {}", e),
    }
}
