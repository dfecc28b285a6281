//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid G1 point encoding")]
    InvalidG1Point,

    #[error("Invalid G2 point encoding")]
    InvalidG2Point,

    #[error("Invalid hex input: {0}")]
    InvalidHex(String),

    #[error("Unsupported ciphertext version: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("Invalid ciphertext format")]
    InvalidCiphertextFormat,

    #[error("Invalid message padding")]
    InvalidPadding,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}

impl From<auction_types::TypeError> for CryptoError {
    fn from(err: auction_types::TypeError) -> Self {
        CryptoError::InvalidHex(err.to_string())
    }
}
