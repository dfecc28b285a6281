//! End-to-end integration tests for the sealed-bid client.
//!
//! These tests run the real HTTP clients against the mock services and
//! exercise the full bid lifecycle:
//! 1. Auction lookup
//! 2. Identity registration and key fetch
//! 3. Bid sealing, signing and submission
//! 4. Key release and reveal
//! 5. Results and winner selection

use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::rngs::OsRng;

use auction_client::{
    create_bid, open_bid, AuctionQuery, BackendClient, BidBackend, BidFlowError, BidForm,
    BidFormInput, BidPhase, ClientConfig, EncryptionNetwork, LocalWallet, NetworkError,
    ShutterClient, SubmissionError, WalletConnector,
};
use auction_types::{Auction, EncryptedBidPayload, EncryptionIdentity, IdentityPrefix};
use mock_services::{sealed_auction, MockServices, MockState};

const ALICE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ALICE_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
const BOB_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

const SLUG: &str = "devconnect";

type Form = BidForm<ShutterClient, BackendClient, LocalWallet>;

/// An expiration on a whole second, one hour out.
fn expiration_in_an_hour() -> DateTime<Utc> {
    let now = Utc::now()
        .duration_trunc(Duration::seconds(1))
        .unwrap_or_else(|_| Utc::now());
    now + Duration::hours(1)
}

async fn start_mock(expiration: DateTime<Utc>) -> MockServices {
    let state = MockState::new(&mut OsRng).with_auction(sealed_auction(
        1,
        SLUG,
        "Devconnect tickets",
        expiration,
    ));
    MockServices::spawn(state).await.unwrap()
}

fn config(mock: &MockServices) -> ClientConfig {
    ClientConfig {
        backend_url: mock.backend_url(),
        shutter_url: mock.shutter_url(),
        require_email: false,
        request_timeout_secs: 5,
    }
}

async fn form_for(mock: &MockServices, wallet: LocalWallet) -> Form {
    let config = config(mock);
    let backend = BackendClient::from_config(&config).unwrap();
    let network = ShutterClient::from_config(&config).unwrap();
    let auction = backend.auction_by_slug(SLUG).await.unwrap();
    BidForm::new(auction, network, backend, wallet)
}

fn bid(name: &str, amount: &str) -> BidFormInput {
    BidFormInput {
        name: name.to_string(),
        contact: format!("@{}", name.to_lowercase()),
        bid_amount: amount.to_string(),
    }
}

/// Test the complete bid flow from submission to reveal.
#[tokio::test]
async fn test_full_sealed_bid_flow() {
    // ========================================
    // Phase 1: Auction lookup
    // ========================================

    let expiration = expiration_in_an_hour();
    let mock = start_mock(expiration).await;
    let wallet = LocalWallet::from_private_key(ALICE_KEY).unwrap();
    let mut form = form_for(&mock, wallet).await;

    assert_eq!(form.auction().expiration_time, expiration);

    // ========================================
    // Phase 2-3: Register, seal, sign, submit
    // ========================================

    let receipt = form.submit(bid("Alice", "123.45")).await.unwrap();
    assert_eq!(form.phase(), &BidPhase::Success);

    let payload = &receipt.payload;
    assert_eq!(payload.decryption_timestamp, expiration.timestamp() as u64);
    assert_eq!(payload.wallet_address.as_str(), ALICE_ADDRESS);
    assert!(payload.message_to_sign.contains("Alice"));
    assert!(payload
        .message_to_sign
        .contains(&payload.encryption_keys.identity_prefix.to_hex()));
    assert_eq!(receipt.ack.success, Some(true));
    assert!(receipt.ack.bid_id.is_some());

    let calls = mock.calls();
    assert_eq!(calls.register_identity, 1);
    assert_eq!(calls.get_data_for_encryption, 1);
    assert_eq!(calls.submit_bid, 1);

    let config = config(&mock);
    let network = ShutterClient::from_config(&config).unwrap();
    let backend = BackendClient::from_config(&config).unwrap();

    let results = backend.sealed_auction_results(SLUG).await.unwrap();
    assert_eq!(results.attendees.len(), 1);
    assert!(results.attendees[0].decrypted_bid_amount.is_none());
    assert!(results.winner.is_none());

    let identity = &receipt.identity.identity;
    assert!(network.get_decryption_key(identity).await.unwrap().is_none());

    // ========================================
    // Phase 4: Key release and reveal
    // ========================================

    mock.set_timestamp(expiration.timestamp());

    let release = network
        .get_decryption_key(identity)
        .await
        .unwrap()
        .expect("key released at decryption time");
    assert_eq!(release.decryption_timestamp, payload.decryption_timestamp);

    let opened = open_bid(&payload.ciphertext, &release.decryption_key).unwrap();
    assert_eq!(opened.name, "Alice");
    assert_eq!(opened.email, "@alice");
    assert_eq!(opened.bid_amount, "123.45");
    assert_eq!(opened.auction_slug, SLUG);
    assert_eq!(opened.wallet_address, ALICE_ADDRESS);

    let revealed = network
        .decrypt_commitment(identity, &payload.ciphertext)
        .await
        .unwrap();
    assert_eq!(revealed, opened);

    // ========================================
    // Phase 5: Results
    // ========================================

    let results = backend.sealed_auction_results(SLUG).await.unwrap();
    let winner = results.winner.expect("winner after reveal");
    assert_eq!(winner.wallet_address, ALICE_ADDRESS);
    assert_eq!(winner.decrypted_bid_amount.as_deref(), Some("123.45"));
}

/// The highest revealed amount wins, compared as decimals.
#[tokio::test]
async fn test_highest_bid_wins() {
    let expiration = expiration_in_an_hour();
    let mock = start_mock(expiration).await;

    let mut alice = form_for(&mock, LocalWallet::from_private_key(ALICE_KEY).unwrap()).await;
    alice.submit(bid("Alice", "99.999")).await.unwrap();

    let bob_wallet = LocalWallet::from_private_key(BOB_KEY).unwrap();
    let bob_address = bob_wallet.address().unwrap();
    let mut bob = form_for(&mock, bob_wallet).await;
    bob.submit(bid("Bob", "100")).await.unwrap();

    mock.set_timestamp(expiration.timestamp() + 1);

    let backend = BackendClient::from_config(&config(&mock)).unwrap();
    let results = backend.sealed_auction_results(SLUG).await.unwrap();
    assert_eq!(results.attendees.len(), 2);
    assert!(results
        .attendees
        .iter()
        .all(|b| b.decrypted_bid_amount.is_some()));

    let winner = results.winner.unwrap();
    assert!(bob_address.same_account(&winner.wallet_address));
    assert_eq!(winner.decrypted_bid_amount.as_deref(), Some("100"));
}

/// A failed registration leaves every later step unrun.
#[tokio::test]
async fn test_registration_failure_stops_before_key_fetch() {
    let mock = start_mock(expiration_in_an_hour()).await;
    mock.fail_registration(Some(500));

    let mut form = form_for(&mock, LocalWallet::from_private_key(ALICE_KEY).unwrap()).await;
    let err = form.submit(bid("Alice", "123.45")).await.unwrap_err();

    assert!(matches!(
        err,
        BidFlowError::Network(NetworkError::Status { status: 500, .. })
    ));
    assert!(matches!(form.phase(), BidPhase::Error(_)));

    let calls = mock.calls();
    assert_eq!(calls.register_identity, 1);
    assert_eq!(calls.get_data_for_encryption, 0);
    assert_eq!(calls.submit_bid, 0);
}

/// The backend's own rejection text reaches the form unchanged.
#[tokio::test]
async fn test_closed_auction_message_is_shown_verbatim() {
    let expiration = expiration_in_an_hour();
    let mock = start_mock(expiration).await;

    // The bidder holds a stale copy of the auction with a later close time.
    let stale: Auction = Auction {
        expiration_time: expiration + Duration::hours(2),
        ..sealed_auction(1, SLUG, "Devconnect tickets", expiration)
    };
    mock.set_timestamp(expiration.timestamp() + 60);

    let config = config(&mock);
    let mut form = BidForm::new(
        stale,
        ShutterClient::from_config(&config).unwrap(),
        BackendClient::from_config(&config).unwrap(),
        LocalWallet::from_private_key(ALICE_KEY).unwrap(),
    );

    let err = form.submit(bid("Alice", "123.45")).await.unwrap_err();
    assert!(matches!(
        err,
        BidFlowError::Submission(SubmissionError::Backend { status: 400, .. })
    ));
    assert_eq!(form.phase(), &BidPhase::Error("auction closed".to_string()));
    assert_eq!(mock.calls().submit_bid, 1);
}

/// Without a wallet nothing reaches the network until one is connected.
#[tokio::test]
async fn test_no_wallet_makes_no_network_calls() {
    let mock = start_mock(expiration_in_an_hour()).await;
    let mut form = form_for(&mock, LocalWallet::disconnected()).await;

    let err = form.submit(bid("Alice", "123.45")).await.unwrap_err();
    assert_eq!(err, BidFlowError::WalletNotConnected);
    assert_eq!(form.phase(), &BidPhase::NeedsWalletConnection);
    assert_eq!(mock.calls().register_identity, 0);

    form.wallet_mut().connect(ALICE_KEY).unwrap();
    let receipt = form.resume().await.unwrap();
    assert_eq!(receipt.payload.wallet_address.as_str(), ALICE_ADDRESS);
    assert_eq!(mock.calls().register_identity, 1);
}

/// Invalid input is rejected locally.
#[tokio::test]
async fn test_invalid_amount_makes_no_network_calls() {
    let mock = start_mock(expiration_in_an_hour()).await;
    let mut form = form_for(&mock, LocalWallet::from_private_key(ALICE_KEY).unwrap()).await;

    let err = form.submit(bid("Alice", "12.5.0")).await.unwrap_err();
    assert!(matches!(err, BidFlowError::Validation(_)));
    assert_eq!(form.phase(), &BidPhase::Idle);
    assert_eq!(mock.calls(), Default::default());
}

/// A signature from another account is refused by the backend.
#[tokio::test]
async fn test_foreign_signature_is_rejected() {
    let expiration = expiration_in_an_hour();
    let mock = start_mock(expiration).await;
    let config = config(&mock);
    let network = ShutterClient::from_config(&config).unwrap();
    let backend = BackendClient::from_config(&config).unwrap();

    let alice = LocalWallet::from_private_key(ALICE_KEY).unwrap();
    let bob = LocalWallet::from_private_key(BOB_KEY).unwrap();
    let address = alice.address().unwrap();

    let mut rng = OsRng;
    let prefix = IdentityPrefix::random(&mut rng);
    let decryption_timestamp = expiration.timestamp() as u64;
    let registered = network
        .register_identity(decryption_timestamp, &prefix)
        .await
        .unwrap();
    let material = network
        .get_encryption_material(&address, &prefix)
        .await
        .unwrap();
    assert_eq!(registered.identity, material.identity);

    let identity = EncryptionIdentity {
        identity_prefix: prefix,
        decryption_timestamp,
        identity: material.identity,
        eon_key: material.eon_key,
        eon: material.eon,
        epoch_id: material.epoch_id,
        tx_hash: registered.tx_hash,
    };
    let timestamp_ms = Utc::now().timestamp_millis();
    let plaintext = auction_types::BidIntent {
        bidder_name: "Alice".to_string(),
        contact_handle: "@alice".to_string(),
        bid_amount: "1".to_string(),
        auction_slug: SLUG.to_string(),
        wallet_address: address.clone(),
    }
    .plaintext(timestamp_ms);
    let prepared = create_bid(plaintext, &identity, &mut rng).unwrap();

    let message_to_sign =
        auction_client::attestation_message(SLUG, "Alice", "@alice", &prefix, timestamp_ms);
    let payload = EncryptedBidPayload {
        auction_slug: SLUG.to_string(),
        name: "Alice".to_string(),
        contact: "@alice".to_string(),
        ciphertext: prepared.ciphertext,
        encryption_keys: identity.keys(),
        signature: bob.sign_message(&message_to_sign).await.unwrap(),
        message_to_sign,
        wallet_address: address,
        decryption_timestamp,
    };

    let err = backend.submit_bid(&payload).await.unwrap_err();
    assert_eq!(
        err,
        SubmissionError::Backend {
            status: 401,
            message: "Invalid signature".to_string()
        }
    );
}

/// Registering the same prefix twice is refused by the network.
#[tokio::test]
async fn test_prefix_cannot_be_registered_twice() {
    let expiration = expiration_in_an_hour();
    let mock = start_mock(expiration).await;
    let network = ShutterClient::from_config(&config(&mock)).unwrap();

    let prefix = IdentityPrefix::random(&mut OsRng);
    let ts = expiration.timestamp() as u64;
    network.register_identity(ts, &prefix).await.unwrap();

    let err = network.register_identity(ts, &prefix).await.unwrap_err();
    assert_eq!(
        err,
        NetworkError::Status {
            status: 400,
            message: "Identity already registered".to_string()
        }
    );
}

/// Auction lookups go through the query client.
#[tokio::test]
async fn test_auction_queries() {
    let mock = start_mock(expiration_in_an_hour()).await;
    let mut english = sealed_auction(2, "english", "Open auction", expiration_in_an_hour());
    english.auction_type = "english".to_string();
    mock.add_auction(english);

    let backend = BackendClient::from_config(&config(&mock)).unwrap();

    let sealed = backend.sealed_auctions().await.unwrap();
    assert_eq!(sealed.len(), 1);
    assert_eq!(sealed[0].slug, SLUG);

    let english = backend.auction_by_slug("english").await.unwrap();
    assert!(!english.is_sealed());

    let err = backend.auction_by_slug("missing").await.unwrap_err();
    assert_eq!(
        err,
        SubmissionError::Backend {
            status: 404,
            message: "Auction not found".to_string()
        }
    );
}
