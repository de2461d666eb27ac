//! Configuration validation utilities

use crate::schema::Config;
use types::Result;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate complete configuration
    pub fn validate(config: &Config) -> Result<ValidationReport> {
        let mut report = ValidationReport::new();

        Self::validate_network(config, &mut report);
        Self::validate_contracts(config, &mut report);
        Self::validate_signer(config, &mut report);
        Self::validate_bundler(config, &mut report);
        Self::validate_queue(config, &mut report);
        Self::validate_validator(config, &mut report);
        Self::validate_server(config, &mut report);
        Self::validate_logging(config, &mut report);

        Ok(report)
    }

    fn validate_network(config: &Config, report: &mut ValidationReport) {
        if config.network.chain_id == 0 {
            report.add_error("network.chain_id", "Chain ID cannot be 0");
        }

        let rpc_url = &config.network.rpc_url;
        if rpc_url.is_empty() {
            report.add_error("network.rpc_url", "RPC URL cannot be empty");
        } else if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") && !rpc_url.starts_with("ws://") && !rpc_url.starts_with("wss://") {
            report.add_error("network.rpc_url", "RPC URL must start with http://, https://, ws://, or wss://");
        } else if rpc_url.starts_with("ws") {
            report.add_warning("network.rpc_url", "WebSocket URLs are not supported by the HTTP ledger client");
        }

        if config.network.rpc_timeout_seconds == 0 {
            report.add_error("network.rpc_timeout_seconds", "RPC timeout cannot be 0");
        } else if config.network.rpc_timeout_seconds > 120 {
            report.add_warning("network.rpc_timeout_seconds", "RPC timeout is very high, a hung node will stall bundling");
        }
    }

    fn validate_contracts(config: &Config, report: &mut ValidationReport) {
        if let Err(e) = config.entry_point() {
            report.add_error("contracts.entry_point", &e);
        }

        if let Err(e) = config.factory() {
            report.add_error("contracts.factory", &e);
        }
    }

    fn validate_signer(config: &Config, report: &mut ValidationReport) {
        let key = config.signer.private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            report.add_error("signer.private_key", "Private key must be 32 bytes of hex");
        }

        if let Err(e) = config.bundler_address() {
            report.add_error("signer.bundler_address", &e);
        }
    }

    fn validate_bundler(config: &Config, report: &mut ValidationReport) {
        let bundler = &config.bundler;

        if bundler.interval_seconds == 0 {
            report.add_error("bundler.interval_seconds", "Bundling interval cannot be 0");
        }

        if bundler.gas_limit < 100_000 {
            report.add_error("bundler.gas_limit", "Bundle gas limit is too low to execute handleOps");
        } else if bundler.gas_limit > 30_000_000 {
            report.add_warning("bundler.gas_limit", "Bundle gas limit exceeds a typical block gas limit");
        }

        if bundler.receipt_poll_attempts == 0 {
            report.add_error("bundler.receipt_poll_attempts", "At least one receipt poll is required");
        }

        if bundler.receipt_poll_interval_ms == 0 {
            report.add_error("bundler.receipt_poll_interval_ms", "Receipt poll interval cannot be 0");
        }

        let poll_budget_ms = bundler
            .receipt_poll_interval_ms
            .saturating_mul(u64::from(bundler.receipt_poll_attempts));
        if bundler.resubmit_after_seconds.saturating_mul(1000) < poll_budget_ms {
            report.add_warning(
                "bundler.resubmit_after_seconds",
                "Operations may be released before the receipt polling budget is spent",
            );
        }
    }

    fn validate_queue(config: &Config, report: &mut ValidationReport) {
        if config.queue.max_age_seconds == 0 {
            report.add_error("queue.max_age_seconds", "Max operation age cannot be 0");
        } else if config.queue.max_age_seconds < config.bundler.resubmit_after_seconds {
            report.add_warning("queue.max_age_seconds", "Operations may be evicted before they can be resubmitted");
        }

        if config.queue.cleanup_interval_seconds == 0 {
            report.add_error("queue.cleanup_interval_seconds", "Cleanup interval cannot be 0");
        }
    }

    fn validate_validator(config: &Config, report: &mut ValidationReport) {
        if config.validator.simulation_gas_limit == 0 {
            report.add_error("validator.simulation_gas_limit", "Simulation gas limit cannot be 0");
        } else if config.validator.simulation_gas_limit < config.bundler.gas_limit {
            report.add_warning(
                "validator.simulation_gas_limit",
                "Simulation gas limit is lower than the bundle gas limit",
            );
        }
    }

    fn validate_server(config: &Config, report: &mut ValidationReport) {
        if config.server.port == 0 {
            report.add_error("server.port", "Server port cannot be 0");
        } else if config.server.port < 1024 {
            report.add_warning("server.port", "Server port is below 1024, may require elevated privileges");
        }

        if config.server.request_timeout_seconds == 0 {
            report.add_error("server.request_timeout_seconds", "Request timeout cannot be 0");
        } else if config.server.request_timeout_seconds > 300 {
            report.add_warning("server.request_timeout_seconds", "Request timeout is very high");
        }

        if config.server.max_body_size == 0 {
            report.add_error("server.max_body_size", "Max body size cannot be 0");
        } else if config.server.max_body_size > 10 * 1024 * 1024 {
            report.add_warning("server.max_body_size", "Max body size is greater than 10MB");
        }

        if config.server.host.is_empty() {
            report.add_error("server.host", "Server host cannot be empty");
        }

        if config.server.cors_enabled && config.server.allowed_origins.is_empty() {
            report.add_warning("server.allowed_origins", "CORS is enabled but no origins are allowed");
        }
    }

    fn validate_logging(config: &Config, report: &mut ValidationReport) {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            report.add_error("logging.level", &format!("Invalid log level: {}. Valid levels: {:?}", config.logging.level, valid_levels));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            report.add_error("logging.format", &format!("Invalid log format: {}. Valid formats: {:?}", config.logging.format, valid_formats));
        }

        if config.logging.level == "trace" || config.logging.level == "debug" {
            report.add_warning("logging.level", "Debug/trace logging may impact performance in production");
        }
    }
}

/// Validation report containing errors and warnings
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// A validation issue (error or warning)
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let report = ConfigValidator::validate(&Config::default()).unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_invalid_addresses_reported() {
        let mut config = Config::default();
        config.contracts.entry_point = "0x1234".to_string();
        config.signer.bundler_address = Some("not-an-address".to_string());

        let report = ConfigValidator::validate(&config).unwrap();
        let fields: Vec<_> = report.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"contracts.entry_point"));
        assert!(fields.contains(&"signer.bundler_address"));
    }

    #[test]
    fn test_short_private_key_rejected() {
        let mut config = Config::default();
        config.signer.private_key = "0xdeadbeef".to_string();
        let report = ConfigValidator::validate(&config).unwrap();
        assert!(report.errors.iter().any(|e| e.field == "signer.private_key"));
    }

    #[test]
    fn test_resubmit_window_warning() {
        let mut config = Config::default();
        config.bundler.resubmit_after_seconds = 1;
        config.bundler.receipt_poll_attempts = 40;
        config.bundler.receipt_poll_interval_ms = 100;
        let report = ConfigValidator::validate(&config).unwrap();
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.field == "bundler.resubmit_after_seconds"));
    }

    #[test]
    fn test_huge_timing_values_do_not_overflow() {
        let mut config = Config::default();
        config.bundler.resubmit_after_seconds = u64::MAX;
        config.bundler.receipt_poll_interval_ms = u64::MAX;
        config.bundler.receipt_poll_attempts = u32::MAX;
        config.queue.max_age_seconds = u64::MAX;

        let report = ConfigValidator::validate(&config).unwrap();
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(!report
            .warnings
            .iter()
            .any(|w| w.field == "bundler.resubmit_after_seconds"));
    }
}
