//! Wire types of the threshold encryption network API.
//!
//! Every response body is wrapped in a `{"message": ...}` envelope. Request
//! bodies use camelCase while response payloads use snake_case.

use serde::{Deserialize, Serialize};

/// Response envelope used by all encryption network endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutterResponse<T> {
    pub message: T,
}

impl<T> ShutterResponse<T> {
    pub fn new(message: T) -> Self {
        Self { message }
    }
}

/// Body of `POST /register_identity`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIdentityRequest {
    pub decryption_timestamp: u64,
    /// 32-byte `0x` hex prefix
    pub identity_prefix: String,
}

/// Result of a successful identity registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredIdentity {
    pub identity: String,
    /// Hex-encoded compressed G2 point (96 bytes)
    pub eon_key: String,
    pub eon: u64,
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub identity_prefix: String,
}

/// Query of `GET /get_data_for_encryption`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionDataQuery {
    pub address: String,
    #[serde(rename = "identityPrefix")]
    pub identity_prefix: String,
}

/// Public key material for a registered identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMaterial {
    pub identity: String,
    pub eon_key: String,
    pub eon: u64,
    pub epoch_id: String,
    pub identity_prefix: String,
}

/// Query of `GET /get_decryption_key`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionKeyQuery {
    pub identity: String,
}

/// A decryption key released by the network after the decryption time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionKeyRelease {
    /// Hex-encoded compressed G1 point (48 bytes)
    pub decryption_key: String,
    pub identity: String,
    pub decryption_timestamp: u64,
}

/// Query of `GET /decrypt_commitment`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptCommitmentQuery {
    pub identity: String,
    #[serde(rename = "encryptedCommitment")]
    pub encrypted_commitment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedCommitment {
    /// Hex-encoded plaintext
    pub decrypted_message: String,
}
