//! Request and response bodies specific to the mock.
//!
//! Bid submissions are parsed leniently so that malformed payloads get the
//! same field-level answers the real backend gives instead of a generic 422.

use serde::{Deserialize, Serialize};

/// Body of `POST /admin/timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRpc {
    /// Unix seconds
    pub timestamp: i64,
}

/// Number of requests served per endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCounters {
    pub register_identity: usize,
    pub get_data_for_encryption: usize,
    pub get_decryption_key: usize,
    pub decrypt_commitment: usize,
    pub submit_bid: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedKeys {
    pub identity: String,
    pub eon_key: String,
    pub epoch_id: String,
    pub identity_prefix: String,
    pub eon: u64,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBidRequest {
    pub auction_slug: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub encrypted_bid: Option<String>,
    pub encryption_keys: Option<SubmittedKeys>,
    pub signature: Option<String>,
    pub message_to_sign: Option<String>,
    pub wallet_address: Option<String>,
    pub decryption_timestamp: Option<u64>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

impl SubmitBidRequest {
    pub fn has_required_fields(&self) -> bool {
        present(&self.auction_slug)
            && present(&self.name)
            && present(&self.encrypted_bid)
            && present(&self.signature)
            && present(&self.message_to_sign)
            && present(&self.wallet_address)
            && self.encryption_keys.is_some()
            && self.decryption_timestamp.is_some()
    }
}
