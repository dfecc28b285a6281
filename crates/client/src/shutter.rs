//! Client for the threshold encryption network.
//!
//! Identities are registered against a future decryption timestamp and a
//! random prefix; the network then hands out the public key material to
//! encrypt to that identity and, once the timestamp passes, the decryption key.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use auction_types::shutter::{
    DecryptCommitmentQuery, DecryptedCommitment, DecryptionKeyQuery, DecryptionKeyRelease,
    EncryptionDataQuery, EncryptionMaterial, RegisterIdentityRequest, RegisteredIdentity,
    ShutterResponse,
};
use auction_types::{BidPlaintext, IdentityPrefix, WalletAddress};

use crate::config::{join_url, ClientConfig};
use crate::http::{build_client, error_parts};

/// Errors talking to the encryption network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("Encryption network returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Encryption network unreachable: {0}")]
    Transport(String),

    #[error("Invalid encryption network response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            NetworkError::InvalidResponse(err.to_string())
        } else {
            NetworkError::Transport(err.to_string())
        }
    }
}

/// The two calls the bid workflow needs from the encryption network.
#[async_trait]
pub trait EncryptionNetwork: Send + Sync {
    /// Register `identity_prefix` to be decryptable at `decryption_timestamp`.
    async fn register_identity(
        &self,
        decryption_timestamp: u64,
        identity_prefix: &IdentityPrefix,
    ) -> Result<RegisteredIdentity, NetworkError>;

    /// Public key material for a previously registered prefix.
    async fn get_encryption_material(
        &self,
        address: &WalletAddress,
        identity_prefix: &IdentityPrefix,
    ) -> Result<EncryptionMaterial, NetworkError>;
}

/// HTTP client for the encryption network API.
#[derive(Debug, Clone)]
pub struct ShutterClient {
    base_url: String,
    http: Client,
}

impl ShutterClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, NetworkError> {
        let http = build_client(config.request_timeout())
            .map_err(|e| NetworkError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::new(config.shutter_url.clone(), http))
    }

    /// Fetch the released decryption key for `identity`.
    ///
    /// Returns `None` while the decryption time has not been reached.
    pub async fn get_decryption_key(
        &self,
        identity: &str,
    ) -> Result<Option<DecryptionKeyRelease>, NetworkError> {
        let query = DecryptionKeyQuery {
            identity: identity.to_string(),
        };
        let response = self
            .http
            .get(join_url(&self.base_url, "get_decryption_key"))
            .query(&query)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(identity, "Decryption key not yet released");
            return Ok(None);
        }

        Self::parse(response).await.map(Some)
    }

    /// Ask the network to decrypt a commitment once its key is released.
    pub async fn decrypt_commitment(
        &self,
        identity: &str,
        encrypted_commitment: &str,
    ) -> Result<BidPlaintext, NetworkError> {
        let query = DecryptCommitmentQuery {
            identity: identity.to_string(),
            encrypted_commitment: encrypted_commitment.to_string(),
        };
        let response = self
            .http
            .get(join_url(&self.base_url, "decrypt_commitment"))
            .query(&query)
            .send()
            .await?;

        let decrypted: DecryptedCommitment = Self::parse(response).await?;
        BidPlaintext::from_hex(&decrypted.decrypted_message)
            .map_err(|e| NetworkError::InvalidResponse(e.to_string()))
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, NetworkError> {
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(NetworkError::Status {
                status,
                message: message.unwrap_or_else(|| format!("request failed with status {status}")),
            });
        }

        let envelope: ShutterResponse<T> = response.json().await?;
        Ok(envelope.message)
    }
}

#[async_trait]
impl EncryptionNetwork for ShutterClient {
    async fn register_identity(
        &self,
        decryption_timestamp: u64,
        identity_prefix: &IdentityPrefix,
    ) -> Result<RegisteredIdentity, NetworkError> {
        let body = RegisterIdentityRequest {
            decryption_timestamp,
            identity_prefix: identity_prefix.to_hex(),
        };

        debug!(identity_prefix = %identity_prefix, decryption_timestamp, "Registering identity");
        let response = self
            .http
            .post(join_url(&self.base_url, "register_identity"))
            .json(&body)
            .send()
            .await?;

        Self::parse(response).await
    }

    async fn get_encryption_material(
        &self,
        address: &WalletAddress,
        identity_prefix: &IdentityPrefix,
    ) -> Result<EncryptionMaterial, NetworkError> {
        let query = EncryptionDataQuery {
            address: address.to_string(),
            identity_prefix: identity_prefix.to_hex(),
        };

        debug!(identity_prefix = %identity_prefix, "Fetching encryption material");
        let response = self
            .http
            .get(join_url(&self.base_url, "get_data_for_encryption"))
            .query(&query)
            .send()
            .await?;

        Self::parse(response).await
    }
}
