//! Utility functions and helpers

use alloy::primitives::{Address, B256};
use std::str::FromStr;

/// Generate a correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validate Ethereum address format
pub fn is_valid_address(address: &str) -> bool {
    if !address.starts_with("0x") {
        return false;
    }

    if address.len() != 42 {
        return false;
    }

    address[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Parse a 32-byte hash, `0x` prefix required
pub fn parse_hash(hash: &str) -> Option<B256> {
    let hash = hash.trim();
    if !hash.starts_with("0x") || hash.len() != 66 {
        return None;
    }
    B256::from_str(hash).ok()
}

/// Parse an address, `0x` prefix required
pub fn parse_address(address: &str) -> Option<Address> {
    let address = address.trim();
    if !is_valid_address(address) {
        return None;
    }
    Address::from_str(address).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("0x1234567890123456789012345678901234567890"));
        assert!(!is_valid_address("1234567890123456789012345678901234567890"));
        assert!(!is_valid_address("0x123"));
        assert!(!is_valid_address("0xGGGG567890123456789012345678901234567890"));
        assert!(parse_address("0x1234567890123456789012345678901234567890").is_some());
    }

    #[test]
    fn test_hash_parsing() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_hash(&hash), Some(B256::repeat_byte(0xab)));
        assert!(parse_hash(&"ab".repeat(32)).is_none());
        assert!(parse_hash("0x123").is_none());
        assert!(parse_hash(&format!("0x{}", "zz".repeat(32))).is_none());
    }
}
