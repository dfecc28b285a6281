//! Query functions for auction state.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use auction_types::{Auction, SealedAuctionResults};

use crate::backend::{BackendClient, SubmissionError};
use crate::http::error_parts;

/// Read-only view of the auction backend.
#[async_trait]
pub trait AuctionQuery: Send + Sync {
    /// Get an auction by its slug.
    async fn auction_by_slug(&self, slug: &str) -> Result<Auction, SubmissionError>;

    /// List all sealed-bid auctions.
    async fn sealed_auctions(&self) -> Result<Vec<Auction>, SubmissionError>;

    /// Get the attendees and, once revealed, the winner of a sealed auction.
    async fn sealed_auction_results(&self, slug: &str)
        -> Result<SealedAuctionResults, SubmissionError>;
}

impl BackendClient {
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<T, SubmissionError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "Querying backend");

        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let (status, message) = error_parts(response).await;
            return Err(SubmissionError::Backend {
                status,
                message: message.unwrap_or_else(|| format!("request failed with status {status}")),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AuctionQuery for BackendClient {
    async fn auction_by_slug(&self, slug: &str) -> Result<Auction, SubmissionError> {
        self.get_json(&["auctionBySlug", slug]).await
    }

    async fn sealed_auctions(&self) -> Result<Vec<Auction>, SubmissionError> {
        self.get_json(&["auctions", "sealed"]).await
    }

    async fn sealed_auction_results(
        &self,
        slug: &str,
    ) -> Result<SealedAuctionResults, SubmissionError> {
        self.get_json(&["auctions", "sealed", slug, "results"]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    use crate::http::testing::serve_once;

    #[tokio::test]
    async fn test_empty_error_body_reports_status() {
        let base = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let client = BackendClient::new(base, Client::new());

        let err = client.sealed_auctions().await.unwrap_err();
        assert_eq!(
            err,
            SubmissionError::Backend {
                status: 503,
                message: "request failed with status 503".to_string(),
            }
        );
    }
}
