//! Bundle transaction forging

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use std::str::FromStr;
use types::SignerError;

/// A signed transaction ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    /// Hash of the signed envelope
    pub hash: B256,
    /// EIP-2718 encoded envelope
    pub raw: Bytes,
}

/// Signer for bundle transactions
#[derive(Clone)]
pub struct BundlerSigner {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl BundlerSigner {
    /// Create a signer from a hex private key (with or without `0x`)
    pub fn new(private_key: &str, chain_id: u64) -> Result<Self, SignerError> {
        let signer = PrivateKeySigner::from_str(private_key.trim())
            .map_err(|e| SignerError::InvalidKey(e.to_string()))?;

        Ok(Self { signer, chain_id })
    }

    /// Address derived from the private key
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Fail unless `expected` (when given) is the address of this key
    pub fn ensure_address(&self, expected: Option<Address>) -> Result<(), SignerError> {
        match expected {
            Some(configured) if configured != self.address() => Err(SignerError::AddressMismatch {
                configured: configured.to_string(),
                derived: self.address().to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Unsigned legacy call transaction on this signer's chain
    pub fn call_transaction(
        &self,
        to: Address,
        input: Bytes,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
    ) -> TxLegacy {
        TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price,
            gas_limit: gas_limit.into(),
            to: TxKind::Call(to),
            value: U256::ZERO,
            input,
        }
    }

    /// Sign with EIP-155 replay protection and encode the envelope
    pub fn sign(&self, mut tx: TxLegacy) -> Result<SignedTransaction, SignerError> {
        if tx.chain_id.is_none() {
            tx.chain_id = Some(self.chain_id);
        }

        let signature = self
            .signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| SignerError::Signing(e.to_string()))?;

        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        tracing::debug!(
            tx_hash = %hash,
            nonce = signed.tx().nonce,
            chain_id = self.chain_id,
            "Signed bundle transaction"
        );
        let envelope = TxEnvelope::from(signed);

        Ok(SignedTransaction {
            hash,
            raw: Bytes::from(envelope.encoded_2718()),
        })
    }
}

impl std::fmt::Debug for BundlerSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundlerSigner")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
