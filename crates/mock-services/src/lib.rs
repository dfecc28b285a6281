//! Mock encryption network and auction backend for local testing.
//!
//! A single axum server plays both external services of the bidder client:
//! the encryption network under `/shutter` and the auction backend under
//! `/api`. Time is simulated and can be moved through `/admin/timestamp` so
//! that key release and auction expiry can be exercised without waiting.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use auction_crypto::{DecryptionKey, EonKey, EonSecret};
use auction_types::{
    decode_hex, decryption_time_reached, encode_hex, Auction, IdentityPrefix, SealedBid,
    SEALED_AUCTION_TYPE,
};

mod admin;
mod backend;
pub mod error;
mod shutter;
pub mod types;

use error::ApiError;
use types::CallCounters;

pub type SharedState = Arc<RwLock<MockState>>;

/// An identity registered with the mock encryption network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub identity_prefix: IdentityPrefix,
    pub identity: String,
    pub decryption_timestamp: u64,
    pub tx_hash: String,
}

/// Shared state of both mocked services.
pub struct MockState {
    secret: EonSecret,
    eon: u64,
    /// Simulated unix seconds; wall clock when unset
    clock: Option<i64>,
    /// Keyed by identity hex
    registrations: HashMap<String, Registration>,
    auctions: BTreeMap<String, Auction>,
    bids: HashMap<String, Vec<SealedBid>>,
    next_bid_id: u64,
    register_failure: Option<u16>,
    calls: CallCounters,
}

impl MockState {
    pub fn new<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            secret: EonSecret::random(rng),
            eon: 1,
            clock: None,
            registrations: HashMap::new(),
            auctions: BTreeMap::new(),
            bids: HashMap::new(),
            next_bid_id: 1,
            register_failure: None,
            calls: CallCounters::default(),
        }
    }

    pub fn with_auction(mut self, auction: Auction) -> Self {
        self.add_auction(auction);
        self
    }

    pub fn add_auction(&mut self, auction: Auction) {
        self.auctions.insert(auction.slug.clone(), auction);
    }

    pub fn auction(&self, slug: &str) -> Option<&Auction> {
        self.auctions.get(slug)
    }

    pub fn eon_key(&self) -> EonKey {
        self.secret.eon_key()
    }

    /// Current simulated time in unix seconds.
    pub fn now(&self) -> i64 {
        self.clock.unwrap_or_else(|| Utc::now().timestamp())
    }

    pub fn now_datetime(&self) -> DateTime<Utc> {
        match self.clock {
            Some(ts) => DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now),
            None => Utc::now(),
        }
    }

    pub fn set_timestamp(&mut self, ts: i64) {
        self.clock = Some(ts);
    }

    pub fn calls(&self) -> &CallCounters {
        &self.calls
    }

    fn registration(&self, identity: &str) -> Result<&Registration, ApiError> {
        self.registrations
            .get(&identity.to_ascii_lowercase())
            .ok_or_else(|| ApiError::bad_request("Unknown identity"))
    }

    fn registration_for_prefix(&self, prefix: &IdentityPrefix) -> Option<&Registration> {
        self.registrations
            .values()
            .find(|r| r.identity_prefix == *prefix)
    }

    fn is_released(&self, registration: &Registration) -> bool {
        decryption_time_reached(registration.decryption_timestamp, self.now_datetime())
    }

    /// Decryption key of a registered identity, once its time has come.
    fn released_key(&self, identity: &str) -> Result<Option<DecryptionKey>, ApiError> {
        let registration = self.registration(identity)?;
        if !self.is_released(registration) {
            return Ok(None);
        }
        let bytes = decode_hex(&registration.identity)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(Some(self.secret.decryption_key(&bytes)))
    }
}

fn digest(domain: &[u8], data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(data);
    encode_hex(hasher.finalize())
}

/// Identity the network binds to a registered prefix.
pub fn identity_for(prefix: &IdentityPrefix) -> String {
    digest(b"MOCK_SHUTTER_IDENTITY", &prefix.0)
}

/// A sealed auction ready to be added to the mock backend.
pub fn sealed_auction(id: u64, slug: &str, name: &str, expiration: DateTime<Utc>) -> Auction {
    let created = expiration - chrono::Duration::days(1);
    Auction {
        id,
        name: name.to_string(),
        slug: slug.to_string(),
        wallet_address: "0x000000000000000000000000000000000000dEaD".to_string(),
        expiration_time: expiration,
        count_down_time: 0,
        auction_type: SEALED_AUCTION_TYPE.to_string(),
        telegram_chat_id: None,
        telegram_thread_id: None,
        winner_wallet_address: None,
        created_at: created,
        updated_at: created,
    }
}

pub fn router(state: SharedState) -> Router {
    let shutter_routes = Router::new()
        .route("/register_identity", post(shutter::register_identity))
        .route(
            "/get_data_for_encryption",
            get(shutter::get_data_for_encryption),
        )
        .route("/get_decryption_key", get(shutter::get_decryption_key))
        .route("/decrypt_commitment", get(shutter::decrypt_commitment));

    let backend_routes = Router::new()
        .route("/auctionBySlug/{slug}", get(backend::auction_by_slug))
        .route("/auctions/sealed", get(backend::sealed_auctions))
        .route("/auctions/sealed/{slug}/submit", post(backend::submit_bid))
        .route(
            "/auctions/sealed/{slug}/results",
            get(backend::sealed_auction_results),
        );

    let admin_routes = Router::new()
        .route("/timestamp", post(admin::set_timestamp))
        .route("/auctions", post(admin::add_auction))
        .route("/calls", get(admin::calls));

    Router::new()
        .nest("/shutter", shutter_routes)
        .nest("/api", backend_routes)
        .nest("/admin", admin_routes)
        .with_state(state)
}

/// A running mock server.
pub struct MockServices {
    addr: SocketAddr,
    state: SharedState,
    task: JoinHandle<()>,
}

impl MockServices {
    /// Serve `state` on an ephemeral localhost port.
    pub async fn spawn(state: MockState) -> std::io::Result<Self> {
        Self::bind(SocketAddr::from(([127, 0, 0, 1], 0)), state).await
    }

    pub async fn bind(addr: SocketAddr, state: MockState) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(RwLock::new(state));
        let app = router(state.clone());

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Mock server stopped: {}", e);
            }
        });

        info!("Mock services listening on {}", addr);
        Ok(Self { addr, state, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutter_url(&self) -> String {
        format!("http://{}/shutter", self.addr)
    }

    pub fn backend_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn calls(&self) -> CallCounters {
        self.state.read().calls.clone()
    }

    /// Answer every registration with `status` until cleared.
    pub fn fail_registration(&self, status: Option<u16>) {
        self.state.write().register_failure = status;
    }

    pub fn set_timestamp(&self, ts: i64) {
        self.state.write().set_timestamp(ts);
    }

    pub fn add_auction(&self, auction: Auction) {
        self.state.write().add_auction(auction);
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for MockServices {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::OsRng;

    #[test]
    fn test_identity_is_bound_to_prefix() {
        let a = identity_for(&IdentityPrefix([1u8; 32]));
        let b = identity_for(&IdentityPrefix([2u8; 32]));
        assert_ne!(a, b);
        assert_eq!(a, identity_for(&IdentityPrefix([1u8; 32])));
        assert_eq!(a.len(), 66);
    }

    #[test]
    fn test_clock_override() {
        let mut state = MockState::new(&mut OsRng);
        let at = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        state.set_timestamp(at.timestamp());
        assert_eq!(state.now(), at.timestamp());
        assert_eq!(state.now_datetime(), at);
    }

    #[test]
    fn test_key_released_only_after_timestamp() {
        let mut state = MockState::new(&mut OsRng);
        let prefix = IdentityPrefix([3u8; 32]);
        let identity = identity_for(&prefix);
        state.registrations.insert(
            identity.clone(),
            Registration {
                identity_prefix: prefix,
                identity: identity.clone(),
                decryption_timestamp: 2_000,
                tx_hash: digest(b"tx", &prefix.0),
            },
        );

        state.set_timestamp(1_999);
        assert!(state.released_key(&identity).unwrap().is_none());

        state.set_timestamp(2_000);
        assert!(state.released_key(&identity).unwrap().is_some());

        assert!(state.released_key("0x00").is_err());
    }
}
