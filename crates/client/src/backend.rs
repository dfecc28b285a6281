//! Submission of encrypted bids to the auction backend.

use async_trait::async_trait;
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, info, warn};

use auction_types::{is_wallet_address, EncryptedBidPayload, SubmissionAck};

use crate::config::ClientConfig;
use crate::http::{build_client, error_parts};
use crate::validation::is_email;

/// Shown when the backend rejects a bid without saying why.
pub const SUBMIT_FALLBACK_MESSAGE: &str = "Failed to submit bid. Please try again.";

/// Errors talking to the auction backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    /// Non-2xx response; `message` is the backend's own text when it sent one.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("Failed to reach backend: {0}")]
    Transport(String),

    #[error("Invalid bid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SubmissionError::InvalidResponse(err.to_string())
        } else {
            SubmissionError::Transport(err.to_string())
        }
    }
}

/// Where sealed bids go once encrypted and signed.
#[async_trait]
pub trait BidBackend: Send + Sync {
    /// Submit a payload exactly once. Implementations never retry.
    async fn submit_bid(&self, payload: &EncryptedBidPayload)
        -> Result<SubmissionAck, SubmissionError>;
}

/// HTTP client for the auction backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: String,
    pub(crate) http: Client,
    require_email: bool,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            require_email: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, SubmissionError> {
        let http = build_client(config.request_timeout()).map_err(|e| {
            SubmissionError::Transport(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self::new(config.backend_url.clone(), http).with_require_email(config.require_email))
    }

    pub fn with_require_email(mut self, require_email: bool) -> Self {
        self.require_email = require_email;
        self
    }

    /// Backend URL with each of `segments` appended as one escaped path segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, SubmissionError> {
        let invalid =
            || SubmissionError::Transport(format!("invalid backend URL: {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }
}

/// Check the payload constraints the backend enforces before sending it.
pub fn check_payload(
    payload: &EncryptedBidPayload,
    require_email: bool,
) -> Result<(), SubmissionError> {
    let required = [
        ("auctionSlug", &payload.auction_slug),
        ("name", &payload.name),
        ("encryptedBid", &payload.ciphertext),
        ("signature", &payload.signature),
        ("messageToSign", &payload.message_to_sign),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(SubmissionError::InvalidPayload(format!("missing {field}")));
    }

    if !is_wallet_address(payload.wallet_address.as_str()) {
        return Err(SubmissionError::InvalidPayload(
            "Invalid wallet address format".to_string(),
        ));
    }

    if require_email && !is_email(&payload.contact) {
        return Err(SubmissionError::InvalidPayload(
            "Invalid email format".to_string(),
        ));
    }

    Ok(())
}

#[async_trait]
impl BidBackend for BackendClient {
    async fn submit_bid(
        &self,
        payload: &EncryptedBidPayload,
    ) -> Result<SubmissionAck, SubmissionError> {
        check_payload(payload, self.require_email)?;

        let url = self.endpoint(&["auctions", "sealed", &payload.auction_slug, "submit"])?;
        debug!(auction = %payload.auction_slug, "Submitting sealed bid");

        let response = self.http.post(url).json(payload).send().await?;

        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            warn!(auction = %payload.auction_slug, status, "Backend rejected bid");
            return Err(SubmissionError::Backend {
                status,
                message: message.unwrap_or_else(|| SUBMIT_FALLBACK_MESSAGE.to_string()),
            });
        }

        // Some deployments acknowledge with an empty or non-JSON body.
        let body = response.text().await?;
        let ack = serde_json::from_str::<SubmissionAck>(&body).unwrap_or_default();

        info!(
            auction = %payload.auction_slug,
            bid_id = ack.bid_id.as_deref().unwrap_or("-"),
            "Sealed bid accepted"
        );
        Ok(ack)
    }
}
