//! Unified error types for the signing core
//!
//! Every fallible operation returns [`SignerResult`]. Errors are plain data
//! (code + message + optional details) so the CLI can emit them as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Main error type for all signing-core operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl SignerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors
    pub fn entropy(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Entropy, msg)
    }

    pub fn invalid_threshold(threshold: usize, key_count: usize) -> Self {
        Self::new(
            ErrorCode::InvalidThreshold,
            format!(
                "threshold {} is outside 1..={} for {} public keys",
                threshold, key_count, key_count
            ),
        )
    }

    pub fn invalid_child(index: u32) -> Self {
        Self::new(
            ErrorCode::InvalidChild,
            format!("child {} produced an invalid key, retry with index {}", index, index.saturating_add(1)),
        )
    }

    pub fn key_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::KeyMismatch, msg)
    }

    pub fn partial_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::PartialSignature, msg)
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, msg)
    }

    pub fn invalid_private_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPrivateKey, msg)
    }

    pub fn invalid_public_key(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPublicKey, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSignature, msg)
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, msg)
    }

    pub fn unsupported_network(coin: &str, chain: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedNetwork,
            format!("unsupported network {}/{}", coin, chain),
        )
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// Whether the caller can fix the input and try again.
    ///
    /// Entropy failures and internal errors are fatal; everything else is a
    /// caller-side input problem.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.code, ErrorCode::Entropy | ErrorCode::Internal)
    }
}

impl fmt::Display for SignerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for SignerError {}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Signing-core taxonomy
    Entropy,
    InvalidThreshold,
    InvalidChild,
    KeyMismatch,
    PartialSignature,

    // Input errors
    InvalidInput,
    InvalidPrivateKey,
    InvalidPublicKey,
    InvalidAddress,
    InvalidExtendedKey,
    InvalidSignature,
    InvalidState,
    UnsupportedNetwork,

    // Parse errors
    HexError,
    JsonError,
    ConfigError,

    // Internal
    Internal,
}

/// Result type alias for signing-core operations
pub type SignerResult<T> = Result<T, SignerError>;

// Conversions from common error types

impl From<serde_json::Error> for SignerError {
    fn from(e: serde_json::Error) -> Self {
        SignerError::new(ErrorCode::JsonError, e.to_string())
    }
}

impl From<hex::FromHexError> for SignerError {
    fn from(e: hex::FromHexError) -> Self {
        SignerError::new(ErrorCode::HexError, e.to_string())
    }
}

impl From<bitcoin::bip32::Error> for SignerError {
    fn from(e: bitcoin::bip32::Error) -> Self {
        SignerError::new(ErrorCode::InvalidExtendedKey, format!("BIP32 error: {}", e))
    }
}

impl From<bitcoin::secp256k1::Error> for SignerError {
    fn from(e: bitcoin::secp256k1::Error) -> Self {
        SignerError::new(ErrorCode::InvalidInput, format!("Secp256k1 error: {}", e))
    }
}

impl From<bitcoin::base58::Error> for SignerError {
    fn from(e: bitcoin::base58::Error) -> Self {
        SignerError::new(ErrorCode::InvalidAddress, format!("Base58 error: {}", e))
    }
}
