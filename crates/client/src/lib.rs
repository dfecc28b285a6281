//! Client SDK for bidding in sealed-bid auctions.
//!
//! This crate provides a high-level API for:
//! - Registering a one-time identity with the threshold encryption network
//! - Sealing bids to that identity and signing them with the bidder's wallet
//! - Submitting sealed bids to the auction backend
//! - Querying auctions, results and released decryption keys

pub mod backend;
pub mod bid;
pub mod config;
pub mod form;
mod http;
pub mod query;
pub mod shutter;
pub mod validation;
pub mod wallet;

pub use backend::{BackendClient, BidBackend, SubmissionError};
pub use bid::{create_bid, open_bid, BidError, PreparedBid};
pub use config::ClientConfig;
pub use form::{attestation_message, BidFlowError, BidForm, BidPhase, SubmissionReceipt};
pub use http::extract_message;
pub use query::AuctionQuery;
pub use shutter::{EncryptionNetwork, NetworkError, ShutterClient};
pub use validation::{BidFormInput, Field, ValidationErrors};
pub use wallet::{LocalWallet, WalletConnector, WalletError};
