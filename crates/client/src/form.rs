//! The sealed-bid form controller.
//!
//! One submission walks through
//! `Validating → Registering → FetchingKeys → Encrypting → Signing → Submitting`
//! and ends in `Success` or `Error`. Every step is awaited before the next one
//! starts and a failure stops the flow where it happened.

use chrono::Utc;
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{info, warn};

use auction_types::{
    Auction, BidIntent, EncryptedBidPayload, EncryptionIdentity, IdentityPrefix, SubmissionAck,
    WalletAddress,
};

use crate::backend::{BidBackend, SubmissionError, SUBMIT_FALLBACK_MESSAGE};
use crate::bid::{create_bid, BidError};
use crate::shutter::{EncryptionNetwork, NetworkError};
use crate::validation::{validate_auction, validate_form, BidFormInput, ValidationErrors};
use crate::wallet::{WalletConnector, WalletError};

/// Where the form currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BidPhase {
    Idle,
    Validating,
    /// Input is valid but there is no wallet to sign with
    NeedsWalletConnection,
    Registering,
    FetchingKeys,
    Encrypting,
    Signing,
    Submitting,
    Success,
    /// Carries the message shown to the bidder
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidFlowError {
    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("Please connect your wallet to place a bid")]
    WalletNotConnected,

    #[error("No bid is waiting for a wallet connection")]
    NothingToResume,

    #[error("Signature request was rejected")]
    SignatureRejected,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Encryption(#[from] BidError),

    #[error(transparent)]
    Wallet(WalletError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

impl From<WalletError> for BidFlowError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => BidFlowError::WalletNotConnected,
            WalletError::Rejected => BidFlowError::SignatureRejected,
            other => BidFlowError::Wallet(other),
        }
    }
}

impl BidFlowError {
    /// Text for the `Error` state.
    pub fn user_message(&self) -> String {
        match self {
            BidFlowError::Submission(SubmissionError::Backend { message, .. }) => message.clone(),
            BidFlowError::Submission(SubmissionError::InvalidPayload(message)) => message.clone(),
            BidFlowError::Submission(_) => SUBMIT_FALLBACK_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// What a successful submission produced.
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub payload: EncryptedBidPayload,
    pub identity: EncryptionIdentity,
    pub ack: SubmissionAck,
}

/// The exact text the wallet is asked to sign.
pub fn attestation_message(
    auction_slug: &str,
    name: &str,
    contact: &str,
    identity_prefix: &IdentityPrefix,
    timestamp_ms: i64,
) -> String {
    format!(
        "Sealed Bid Submission\n\n\
         Auction: {auction_slug}\n\
         Name: {name}\n\
         Email: {contact}\n\
         Bid Identity Prefix: {identity_prefix}\n\
         Timestamp: {timestamp_ms}"
    )
}

fn ensure_prefix(sent: &IdentityPrefix, echoed: &str) -> Result<(), NetworkError> {
    if sent.matches_hex(echoed) {
        Ok(())
    } else {
        Err(NetworkError::InvalidResponse(format!(
            "identity prefix mismatch: sent {sent}, got {echoed}"
        )))
    }
}

/// Sealed-bid form for one auction.
pub struct BidForm<N, B, W> {
    auction: Auction,
    network: N,
    backend: B,
    wallet: W,
    require_email: bool,
    phase: BidPhase,
    field_errors: ValidationErrors,
    pending: Option<BidFormInput>,
}

impl<N, B, W> BidForm<N, B, W>
where
    N: EncryptionNetwork,
    B: BidBackend,
    W: WalletConnector,
{
    pub fn new(auction: Auction, network: N, backend: B, wallet: W) -> Self {
        Self {
            auction,
            network,
            backend,
            wallet,
            require_email: false,
            phase: BidPhase::Idle,
            field_errors: ValidationErrors::default(),
            pending: None,
        }
    }

    pub fn require_email(mut self, require_email: bool) -> Self {
        self.require_email = require_email;
        self
    }

    pub fn phase(&self) -> &BidPhase {
        &self.phase
    }

    pub fn field_errors(&self) -> &ValidationErrors {
        &self.field_errors
    }

    pub fn is_submitting(&self) -> bool {
        matches!(
            self.phase,
            BidPhase::Validating
                | BidPhase::Registering
                | BidPhase::FetchingKeys
                | BidPhase::Encrypting
                | BidPhase::Signing
                | BidPhase::Submitting
        )
    }

    pub fn auction(&self) -> &Auction {
        &self.auction
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn wallet_mut(&mut self) -> &mut W {
        &mut self.wallet
    }

    /// Back to `Idle`, dropping errors and any bid waiting for a wallet.
    pub fn reset(&mut self) {
        self.phase = BidPhase::Idle;
        self.field_errors = ValidationErrors::default();
        self.pending = None;
    }

    /// Validate and submit a bid.
    pub async fn submit(&mut self, input: BidFormInput) -> Result<SubmissionReceipt, BidFlowError> {
        self.phase = BidPhase::Validating;
        self.field_errors = ValidationErrors::default();
        self.pending = None;

        let mut errors = validate_form(&input, self.require_email);
        errors.merge(validate_auction(&self.auction, Utc::now()));
        if !errors.is_empty() {
            self.phase = BidPhase::Idle;
            self.field_errors = errors.clone();
            return Err(BidFlowError::Validation(errors));
        }

        let Some(address) = self.wallet.address() else {
            info!(auction = %self.auction.slug, "Waiting for wallet connection");
            self.phase = BidPhase::NeedsWalletConnection;
            self.pending = Some(input);
            return Err(BidFlowError::WalletNotConnected);
        };

        let result = self.seal_and_submit(&input, address).await;
        match &result {
            Ok(_) => self.phase = BidPhase::Success,
            Err(err) => {
                warn!(auction = %self.auction.slug, error = %err, "Bid submission failed");
                self.phase = BidPhase::Error(err.user_message());
            }
        }
        result
    }

    /// Continue a bid that stopped in `NeedsWalletConnection`.
    pub async fn resume(&mut self) -> Result<SubmissionReceipt, BidFlowError> {
        if self.phase != BidPhase::NeedsWalletConnection {
            return Err(BidFlowError::NothingToResume);
        }
        let input = self.pending.take().ok_or(BidFlowError::NothingToResume)?;
        self.submit(input).await
    }

    async fn seal_and_submit(
        &mut self,
        input: &BidFormInput,
        address: WalletAddress,
    ) -> Result<SubmissionReceipt, BidFlowError> {
        let mut rng = OsRng;
        let slug = self.auction.slug.clone();
        let prefix = IdentityPrefix::random(&mut rng);
        let decryption_timestamp = self.auction.decryption_timestamp();

        self.phase = BidPhase::Registering;
        info!(auction = %slug, identity_prefix = %prefix, decryption_timestamp, "Registering bid identity");
        let registered = self
            .network
            .register_identity(decryption_timestamp, &prefix)
            .await?;
        ensure_prefix(&prefix, &registered.identity_prefix)?;

        self.phase = BidPhase::FetchingKeys;
        let material = self
            .network
            .get_encryption_material(&address, &prefix)
            .await?;
        ensure_prefix(&prefix, &material.identity_prefix)?;

        let identity = EncryptionIdentity {
            identity_prefix: prefix,
            decryption_timestamp,
            identity: material.identity,
            eon_key: material.eon_key,
            eon: material.eon,
            epoch_id: material.epoch_id,
            tx_hash: registered.tx_hash,
        };

        self.phase = BidPhase::Encrypting;
        let timestamp_ms = Utc::now().timestamp_millis();
        let intent = BidIntent {
            bidder_name: input.name.trim().to_string(),
            contact_handle: input.contact.trim().to_string(),
            bid_amount: input.bid_amount.clone(),
            auction_slug: slug.clone(),
            wallet_address: address.clone(),
        };
        let prepared = create_bid(intent.plaintext(timestamp_ms), &identity, &mut rng)?;

        self.phase = BidPhase::Signing;
        let message_to_sign = attestation_message(
            &slug,
            &intent.bidder_name,
            &intent.contact_handle,
            &prefix,
            timestamp_ms,
        );
        let signature = self.wallet.sign_message(&message_to_sign).await?;

        self.phase = BidPhase::Submitting;
        let payload = EncryptedBidPayload {
            auction_slug: slug.clone(),
            name: intent.bidder_name,
            contact: intent.contact_handle,
            ciphertext: prepared.ciphertext,
            encryption_keys: identity.keys(),
            signature,
            message_to_sign,
            wallet_address: address,
            decryption_timestamp,
        };
        let ack = self.backend.submit_bid(&payload).await?;

        info!(auction = %slug, identity_prefix = %prefix, "Sealed bid submitted");
        Ok(SubmissionReceipt {
            payload,
            identity,
            ack,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use auction_crypto::EonSecret;
    use auction_types::shutter::{EncryptionMaterial, RegisteredIdentity};
    use auction_types::{encode_hex, BidPlaintext};
    use chrono::Duration;

    use crate::backend::BackendClient;
    use crate::bid::open_bid;
    use crate::http::testing::serve_once;

    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    struct FakeNetwork {
        secret: EonSecret,
        register_failure: Option<u16>,
        wrong_prefix: bool,
        register_calls: AtomicUsize,
        material_calls: AtomicUsize,
        registered: Mutex<Vec<(u64, IdentityPrefix)>>,
    }

    impl FakeNetwork {
        fn new() -> Self {
            Self {
                secret: EonSecret::random(&mut OsRng),
                register_failure: None,
                wrong_prefix: false,
                register_calls: AtomicUsize::new(0),
                material_calls: AtomicUsize::new(0),
                registered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EncryptionNetwork for FakeNetwork {
        async fn register_identity(
            &self,
            decryption_timestamp: u64,
            identity_prefix: &IdentityPrefix,
        ) -> Result<RegisteredIdentity, NetworkError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = self.register_failure {
                return Err(NetworkError::Status {
                    status,
                    message: "Internal Server Error".to_string(),
                });
            }
            self.registered
                .lock()
                .unwrap()
                .push((decryption_timestamp, *identity_prefix));

            let echoed = if self.wrong_prefix {
                IdentityPrefix([0u8; 32])
            } else {
                *identity_prefix
            };
            Ok(RegisteredIdentity {
                identity: identity_prefix.to_hex(),
                eon_key: self.secret.eon_key().to_hex(),
                eon: 1,
                tx_hash: Some(encode_hex([0xaau8; 32])),
                identity_prefix: echoed.to_hex(),
            })
        }

        async fn get_encryption_material(
            &self,
            _address: &WalletAddress,
            identity_prefix: &IdentityPrefix,
        ) -> Result<EncryptionMaterial, NetworkError> {
            self.material_calls.fetch_add(1, Ordering::SeqCst);
            Ok(EncryptionMaterial {
                identity: identity_prefix.to_hex(),
                eon_key: self.secret.eon_key().to_hex(),
                eon: 1,
                epoch_id: encode_hex([0xbbu8; 32]),
                identity_prefix: identity_prefix.to_hex(),
            })
        }
    }

    struct FakeBackend {
        response: Result<SubmissionAck, SubmissionError>,
        submitted: Mutex<Vec<EncryptedBidPayload>>,
    }

    impl FakeBackend {
        fn accepting() -> Self {
            Self::answering(Ok(SubmissionAck::default()))
        }

        fn answering(response: Result<SubmissionAck, SubmissionError>) -> Self {
            Self {
                response,
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn submissions(&self) -> usize {
            self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BidBackend for FakeBackend {
        async fn submit_bid(
            &self,
            payload: &EncryptedBidPayload,
        ) -> Result<SubmissionAck, SubmissionError> {
            self.submitted.lock().unwrap().push(payload.clone());
            self.response.clone()
        }
    }

    struct FakeWallet {
        address: Option<WalletAddress>,
        reject: bool,
        signed: Mutex<Vec<String>>,
    }

    impl FakeWallet {
        fn connected() -> Self {
            Self {
                address: Some(WalletAddress::parse(ADDRESS).unwrap()),
                reject: false,
                signed: Mutex::new(Vec::new()),
            }
        }

        fn disconnected() -> Self {
            Self {
                address: None,
                ..Self::connected()
            }
        }
    }

    #[async_trait]
    impl WalletConnector for FakeWallet {
        fn address(&self) -> Option<WalletAddress> {
            self.address.clone()
        }

        async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
            if self.reject {
                return Err(WalletError::Rejected);
            }
            self.signed.lock().unwrap().push(message.to_string());
            Ok(encode_hex([0x5au8; 65]))
        }
    }

    fn open_auction() -> Auction {
        let now = Utc::now();
        let json = serde_json::json!({
            "id": 1,
            "name": "Devconnect tickets",
            "slug": "devconnect",
            "walletAddress": "0x0000000000000000000000000000000000000001",
            "expirationTime": now + Duration::hours(2),
            "countDownTime": 0,
            "type": "sealed",
            "createdAt": now,
            "updatedAt": now
        });
        serde_json::from_value(json).unwrap()
    }

    fn alice() -> BidFormInput {
        BidFormInput {
            name: "Alice".to_string(),
            contact: "@alice".to_string(),
            bid_amount: "123.45".to_string(),
        }
    }

    fn form(
        network: FakeNetwork,
        backend: FakeBackend,
        wallet: FakeWallet,
    ) -> BidForm<FakeNetwork, FakeBackend, FakeWallet> {
        BidForm::new(open_auction(), network, backend, wallet)
    }

    #[tokio::test]
    async fn test_submit_success() {
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), FakeWallet::connected());
        let expected_ts = form.auction().decryption_timestamp();

        let receipt = form.submit(alice()).await.unwrap();
        assert_eq!(form.phase(), &BidPhase::Success);

        let registered = form.network().registered.lock().unwrap().clone();
        assert_eq!(registered.len(), 1);
        let (sent_ts, sent_prefix) = registered[0];
        assert_eq!(sent_ts, expected_ts);

        let payload = &receipt.payload;
        assert_eq!(payload.wallet_address.as_str(), ADDRESS);
        assert_eq!(payload.decryption_timestamp, expected_ts);
        assert_eq!(payload.encryption_keys.identity_prefix, sent_prefix);
        assert_eq!(payload.encryption_keys.tx_hash, Some(encode_hex([0xaau8; 32])));
        assert!(payload.message_to_sign.contains("Name: Alice"));
        assert!(payload
            .message_to_sign
            .contains(&format!("Bid Identity Prefix: {}", sent_prefix.to_hex())));
        assert_eq!(
            form.wallet().signed.lock().unwrap().as_slice(),
            &[payload.message_to_sign.clone()]
        );
        assert_eq!(form.backend().submissions(), 1);
    }

    #[tokio::test]
    async fn test_sealed_bid_opens_to_original_fields() {
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), FakeWallet::connected());
        let receipt = form.submit(alice()).await.unwrap();

        let prefix = receipt.identity.identity_prefix;
        let key = form.network().secret.decryption_key(&prefix.0);
        let opened: BidPlaintext = open_bid(&receipt.payload.ciphertext, &key.to_hex()).unwrap();

        assert_eq!(opened.name, "Alice");
        assert_eq!(opened.email, "@alice");
        assert_eq!(opened.bid_amount, "123.45");
        assert_eq!(opened.auction_slug, "devconnect");
        assert_eq!(opened.wallet_address, ADDRESS);
        assert!(receipt
            .payload
            .message_to_sign
            .ends_with(&format!("Timestamp: {}", opened.timestamp)));
    }

    #[tokio::test]
    async fn test_invalid_amounts_make_no_network_call() {
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), FakeWallet::connected());

        for amount in ["", "-5", "1.0000000000000000001", "ten", " 1 "] {
            let input = BidFormInput {
                bid_amount: amount.to_string(),
                ..alice()
            };
            let err = form.submit(input).await.unwrap_err();
            assert!(matches!(err, BidFlowError::Validation(_)));
            assert_eq!(form.phase(), &BidPhase::Idle);
            assert!(form
                .field_errors()
                .get(crate::validation::Field::BidAmount)
                .is_some());
        }
        assert_eq!(form.network().register_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_email_required_variant() {
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), FakeWallet::connected())
            .require_email(true);

        let err = form.submit(alice()).await.unwrap_err();
        assert!(matches!(err, BidFlowError::Validation(_)));

        let input = BidFormInput {
            contact: "alice@example.com".to_string(),
            ..alice()
        };
        assert!(form.submit(input).await.is_ok());
    }

    #[tokio::test]
    async fn test_ended_auction_is_rejected() {
        let mut auction = open_auction();
        auction.expiration_time = Utc::now() - Duration::minutes(1);
        let mut form = BidForm::new(
            auction,
            FakeNetwork::new(),
            FakeBackend::accepting(),
            FakeWallet::connected(),
        );

        let err = form.submit(alice()).await.unwrap_err();
        assert_eq!(err.user_message(), "This auction has ended");
        assert_eq!(form.network().register_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_wallet_waits_then_resumes() {
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), FakeWallet::disconnected());

        let err = form.submit(alice()).await.unwrap_err();
        assert_eq!(err, BidFlowError::WalletNotConnected);
        assert_eq!(form.phase(), &BidPhase::NeedsWalletConnection);
        assert_eq!(form.network().register_calls.load(Ordering::SeqCst), 0);

        form.wallet_mut().address = Some(WalletAddress::parse(ADDRESS).unwrap());
        let receipt = form.resume().await.unwrap();
        assert_eq!(receipt.payload.name, "Alice");
        assert_eq!(form.phase(), &BidPhase::Success);
        assert_eq!(form.resume().await.unwrap_err(), BidFlowError::NothingToResume);
    }

    #[tokio::test]
    async fn test_register_failure_stops_flow() {
        let mut network = FakeNetwork::new();
        network.register_failure = Some(500);
        let mut form = form(network, FakeBackend::accepting(), FakeWallet::connected());

        let err = form.submit(alice()).await.unwrap_err();
        assert!(matches!(err, BidFlowError::Network(NetworkError::Status { status: 500, .. })));
        assert!(matches!(form.phase(), BidPhase::Error(_)));
        assert_eq!(form.network().material_calls.load(Ordering::SeqCst), 0);
        assert!(form.wallet().signed.lock().unwrap().is_empty());
        assert_eq!(form.backend().submissions(), 0);
    }

    #[tokio::test]
    async fn test_prefix_mismatch_stops_flow() {
        let mut network = FakeNetwork::new();
        network.wrong_prefix = true;
        let mut form = form(network, FakeBackend::accepting(), FakeWallet::connected());

        let err = form.submit(alice()).await.unwrap_err();
        assert!(matches!(err, BidFlowError::Network(NetworkError::InvalidResponse(_))));
        assert_eq!(form.network().material_calls.load(Ordering::SeqCst), 0);
        assert_eq!(form.backend().submissions(), 0);
    }

    #[tokio::test]
    async fn test_rejected_signature() {
        let mut wallet = FakeWallet::connected();
        wallet.reject = true;
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), wallet);

        let err = form.submit(alice()).await.unwrap_err();
        assert_eq!(err, BidFlowError::SignatureRejected);
        assert_eq!(
            form.phase(),
            &BidPhase::Error("Signature request was rejected".to_string())
        );
        assert_eq!(form.backend().submissions(), 0);
    }

    #[tokio::test]
    async fn test_backend_message_is_shown_verbatim() {
        let backend = FakeBackend::answering(Err(SubmissionError::Backend {
            status: 400,
            message: "auction closed".to_string(),
        }));
        let mut form = form(FakeNetwork::new(), backend, FakeWallet::connected());

        form.submit(alice()).await.unwrap_err();
        assert_eq!(form.phase(), &BidPhase::Error("auction closed".to_string()));
    }

    #[tokio::test]
    async fn test_transport_failure_uses_fallback_message() {
        let backend =
            FakeBackend::answering(Err(SubmissionError::Transport("connection refused".into())));
        let mut form = form(FakeNetwork::new(), backend, FakeWallet::connected());

        form.submit(alice()).await.unwrap_err();
        assert_eq!(
            form.phase(),
            &BidPhase::Error(SUBMIT_FALLBACK_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_silent_backend_failure_shows_fallback_message() {
        let base = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let backend = BackendClient::new(base, reqwest::Client::new());
        let mut form = BidForm::new(
            open_auction(),
            FakeNetwork::new(),
            backend,
            FakeWallet::connected(),
        );

        form.submit(alice()).await.unwrap_err();
        assert_eq!(
            form.phase(),
            &BidPhase::Error(SUBMIT_FALLBACK_MESSAGE.to_string())
        );
    }

    #[tokio::test]
    async fn test_each_attempt_uses_fresh_prefix() {
        let mut form = form(FakeNetwork::new(), FakeBackend::accepting(), FakeWallet::connected());

        let first = form.submit(alice()).await.unwrap();
        form.reset();
        assert_eq!(form.phase(), &BidPhase::Idle);
        let second = form.submit(alice()).await.unwrap();

        assert_ne!(
            first.identity.identity_prefix,
            second.identity.identity_prefix
        );
        assert_ne!(first.payload.ciphertext, second.payload.ciphertext);
    }

    #[test]
    fn test_attestation_message_format() {
        let prefix = IdentityPrefix([0x01; 32]);
        let message = attestation_message("devconnect", "Alice", "@alice", &prefix, 1_700_000_000_000);
        assert_eq!(
            message,
            format!(
                "Sealed Bid Submission\n\nAuction: devconnect\nName: Alice\nEmail: @alice\n\
                 Bid Identity Prefix: {}\nTimestamp: 1700000000000",
                prefix.to_hex()
            )
        );
    }

    #[test]
    fn test_wallet_errors_map_to_flow_errors() {
        assert_eq!(
            BidFlowError::from(WalletError::NotConnected),
            BidFlowError::WalletNotConnected
        );
        assert_eq!(
            BidFlowError::from(WalletError::Rejected).user_message(),
            "Signature request was rejected"
        );
    }
}
