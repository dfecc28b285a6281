//! Core type definitions for sealed-bid auction submissions.
//!
//! This crate provides the shared data structures used across the bidder
//! client, the encryption network wire format and the backend payloads.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub mod shutter;

/// Auction `type` value for sealed-bid auctions.
pub const SEALED_AUCTION_TYPE: &str = "sealed";

/// Errors produced while parsing shared types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid wallet address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid plaintext bid: {0}")]
    InvalidPlaintext(String),
}

// =========================
// HEX HELPERS
// =========================

/// Decode a hex string with an optional `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, TypeError> {
    let stripped = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(stripped).map_err(|e| TypeError::InvalidHex(e.to_string()))
}

/// Encode bytes as lowercase hex with a `0x` prefix.
pub fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

// =========================
// IDENTITY PREFIX
// =========================

/// 32 random bytes chosen by the bidder for a single bid.
///
/// Combined with the encryption network's binding it determines the identity
/// the bid is encrypted to. A prefix is consumed on registration and must never
/// be reused for another bid.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityPrefix(pub [u8; 32]);

impl IdentityPrefix {
    /// Draw a fresh prefix from a cryptographically secure RNG.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        encode_hex(self.0)
    }

    /// Compare against a hex string echoed back by the network.
    pub fn matches_hex(&self, other: &str) -> bool {
        other
            .parse::<IdentityPrefix>()
            .map(|parsed| parsed == *self)
            .unwrap_or(false)
    }
}

impl fmt::Display for IdentityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for IdentityPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityPrefix({})", self.to_hex())
    }
}

impl FromStr for IdentityPrefix {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        let got = bytes.len();
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TypeError::InvalidLength { expected: 32, got })?;
        Ok(Self(array))
    }
}

impl Serialize for IdentityPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =========================
// WALLET ADDRESS
// =========================

/// EVM account address: `0x` followed by 40 hex characters.
///
/// The original casing is preserved so that payloads carry the address exactly
/// as the wallet reported it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn parse(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if is_wallet_address(&value) {
            Ok(Self(value))
        } else {
            Err(TypeError::InvalidAddress(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Address equality ignoring EIP-55 checksum casing.
    pub fn same_account(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

/// Check the `0x` + 40 hex characters shape.
pub fn is_wallet_address(value: &str) -> bool {
    value.len() == 42
        && value.starts_with("0x")
        && value[2..].chars().all(|c| c.is_ascii_hexdigit())
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

// =========================
// BID TYPES
// =========================

/// A validated bid as entered by the bidder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidIntent {
    pub bidder_name: String,
    pub contact_handle: String,
    /// Decimal amount with up to 18 fraction digits
    pub bid_amount: String,
    pub auction_slug: String,
    pub wallet_address: WalletAddress,
}

impl BidIntent {
    /// Build the plaintext that gets encrypted, stamped with client time in millis.
    pub fn plaintext(&self, timestamp_ms: i64) -> BidPlaintext {
        BidPlaintext {
            name: self.bidder_name.clone(),
            email: self.contact_handle.clone(),
            wallet_address: self.wallet_address.to_string(),
            bid_amount: self.bid_amount.clone(),
            auction_slug: self.auction_slug.clone(),
            timestamp: timestamp_ms,
        }
    }
}

/// Fixed-shape JSON object that is encrypted to the bid's identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidPlaintext {
    pub name: String,
    pub email: String,
    pub wallet_address: String,
    pub bid_amount: String,
    pub auction_slug: String,
    /// Client time in unix milliseconds
    pub timestamp: i64,
}

impl BidPlaintext {
    pub fn to_json_bytes(&self) -> Vec<u8> {
        // A struct of strings and integers always serializes.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// JSON encoded as `0x` hex, the form handed to the encryptor.
    pub fn to_hex(&self) -> String {
        encode_hex(self.to_json_bytes())
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::InvalidPlaintext(e.to_string()))
    }

    pub fn from_hex(value: &str) -> Result<Self, TypeError> {
        Self::from_json_bytes(&decode_hex(value)?)
    }
}

/// Everything known about the encryption identity of one submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptionIdentity {
    pub identity_prefix: IdentityPrefix,
    /// Unix seconds at which the network releases the decryption key
    pub decryption_timestamp: u64,
    pub identity: String,
    pub eon_key: String,
    pub eon: u64,
    pub epoch_id: String,
    pub tx_hash: Option<String>,
}

impl EncryptionIdentity {
    /// The subset of the identity the backend needs to decrypt later.
    pub fn keys(&self) -> EncryptionKeys {
        EncryptionKeys {
            identity: self.identity.clone(),
            eon_key: self.eon_key.clone(),
            epoch_id: self.epoch_id.clone(),
            identity_prefix: self.identity_prefix,
            eon: self.eon,
            tx_hash: self.tx_hash.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionKeys {
    pub identity: String,
    pub eon_key: String,
    pub epoch_id: String,
    pub identity_prefix: IdentityPrefix,
    pub eon: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// The bundle POSTed to the backend, exactly once per successful attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedBidPayload {
    pub auction_slug: String,
    pub name: String,
    /// Contact handle (email or Telegram)
    #[serde(rename = "email")]
    pub contact: String,
    /// Hex-encoded ciphertext
    #[serde(rename = "encryptedBid")]
    pub ciphertext: String,
    pub encryption_keys: EncryptionKeys,
    pub signature: String,
    /// The exact string the wallet signed
    pub message_to_sign: String,
    pub wallet_address: WalletAddress,
    pub decryption_timestamp: u64,
}

/// Backend acknowledgement of a submitted bid. Every field is optional since
/// some deployments answer with an empty body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub bid_id: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub decryption_timestamp: Option<String>,
}

// =========================
// AUCTION TYPES
// =========================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub wallet_address: String,
    pub expiration_time: DateTime<Utc>,
    pub count_down_time: i64,
    #[serde(rename = "type")]
    pub auction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auction {
    pub fn is_sealed(&self) -> bool {
        self.auction_type == SEALED_AUCTION_TYPE
    }

    /// Bidding is over once the expiration time has been reached.
    pub fn is_ended(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time <= now
    }

    /// The earliest whole second at or after expiration.
    ///
    /// Sub-second expirations round up so that a bid can never be unsealed
    /// before the auction closes.
    pub fn decryption_timestamp(&self) -> u64 {
        let secs = self.expiration_time.timestamp();
        let rounded = if self.expiration_time.timestamp_subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        };
        rounded.max(0) as u64
    }
}

/// A bid as listed on the results view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedBid {
    pub id: u64,
    pub wallet_address: String,
    pub encrypted_bid: String,
    /// Only present once the bid has been revealed
    #[serde(default)]
    pub decrypted_bid_amount: Option<String>,
    pub decryption_timestamp: u64,
    pub identity: String,
    pub eon: u64,
    pub eon_key: String,
    pub epoch_id: String,
    #[serde(default)]
    pub tx_hash: Option<String>,
    pub signature: String,
    pub message_to_sign: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedAuctionResults {
    pub auction: Auction,
    pub attendees: Vec<SealedBid>,
    #[serde(default)]
    pub winner: Option<SealedBid>,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Whether the decryption key for `timestamp` should already be released.
pub fn decryption_time_reached(timestamp: u64, now: DateTime<Utc>) -> bool {
    now.timestamp() >= timestamp as i64
}

/// Human-readable UTC rendering of a decryption timestamp.
pub fn format_decryption_time(timestamp: u64) -> String {
    match DateTime::<Utc>::from_timestamp(timestamp as i64, 0) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => timestamp.to_string(),
    }
}

/// Order two non-negative decimal amounts without going through floats.
///
/// Inputs are expected to be in the validated `\d+(\.\d{1,18})?` shape.
pub fn compare_amounts(a: &str, b: &str) -> Ordering {
    fn split(value: &str) -> (&str, &str) {
        let (int, frac) = value.split_once('.').unwrap_or((value, ""));
        let int = int.trim_start_matches('0');
        let frac = frac.trim_end_matches('0');
        (int, frac)
    }

    let (a_int, a_frac) = split(a);
    let (b_int, b_frac) = split(b);

    a_int
        .len()
        .cmp(&b_int.len())
        .then_with(|| a_int.cmp(b_int))
        .then_with(|| a_frac.cmp(b_frac))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::OsRng;

    fn test_auction(expiration: DateTime<Utc>) -> Auction {
        Auction {
            id: 1,
            name: "Devconnect tickets".to_string(),
            slug: "devconnect".to_string(),
            wallet_address: "0x0000000000000000000000000000000000000001".to_string(),
            expiration_time: expiration,
            count_down_time: 0,
            auction_type: "sealed".to_string(),
            telegram_chat_id: None,
            telegram_thread_id: None,
            winner_wallet_address: None,
            created_at: expiration,
            updated_at: expiration,
        }
    }

    #[test]
    fn test_identity_prefix_is_fresh() {
        let mut rng = OsRng;
        let a = IdentityPrefix::random(&mut rng);
        let b = IdentityPrefix::random(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_prefix_hex() {
        let prefix = IdentityPrefix([0xab; 32]);
        let hex = prefix.to_hex();
        assert_eq!(hex.len(), 66);
        assert!(hex.starts_with("0xabab"));
        assert_eq!(hex.parse::<IdentityPrefix>().unwrap(), prefix);
        assert!(prefix.matches_hex(&hex.to_uppercase().replacen("0X", "0x", 1)));
        assert!("0xabcd".parse::<IdentityPrefix>().is_err());
    }

    #[test]
    fn test_wallet_address_shape() {
        assert!(WalletAddress::parse("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_ok());
        assert!(WalletAddress::parse("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_err());
        assert!(WalletAddress::parse("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb9226").is_err());
        assert!(WalletAddress::parse("0xz39Fd6e51aad88F6F4ce6aB8827279cffFb92266").is_err());

        let address = WalletAddress::parse("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        assert!(address.same_account("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"));
    }

    #[test]
    fn test_payload_wire_names() {
        let payload = EncryptedBidPayload {
            auction_slug: "devconnect".to_string(),
            name: "Alice".to_string(),
            contact: "alice@example.com".to_string(),
            ciphertext: "0x03aa".to_string(),
            encryption_keys: EncryptionKeys {
                identity: "0x01".to_string(),
                eon_key: "0x02".to_string(),
                epoch_id: "0x03".to_string(),
                identity_prefix: IdentityPrefix([1u8; 32]),
                eon: 7,
                tx_hash: None,
            },
            signature: "0xsig".to_string(),
            message_to_sign: "hello".to_string(),
            wallet_address: WalletAddress::parse("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
                .unwrap(),
            decryption_timestamp: 1_700_000_000,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["encryptedBid"], "0x03aa");
        assert_eq!(value["email"], "alice@example.com");
        assert_eq!(value["encryptionKeys"]["eonKey"], "0x02");
        assert_eq!(value["encryptionKeys"]["identityPrefix"], IdentityPrefix([1u8; 32]).to_hex());
        assert!(value["encryptionKeys"].get("txHash").is_none());
        assert_eq!(value["walletAddress"], "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    }

    #[test]
    fn test_auction_from_backend_json() {
        let json = r#"{
            "id": 3,
            "name": "Devconnect",
            "slug": "devconnect",
            "walletAddress": "0x0000000000000000000000000000000000000001",
            "expirationTime": "2025-11-17T12:00:00.000Z",
            "countDownTime": 600,
            "type": "sealed",
            "createdAt": "2025-10-01T00:00:00.000Z",
            "updatedAt": "2025-10-01T00:00:00.000Z"
        }"#;
        let auction: Auction = serde_json::from_str(json).unwrap();
        assert!(auction.is_sealed());
        assert_eq!(auction.decryption_timestamp(), 1_763_380_800);
    }

    #[test]
    fn test_decryption_timestamp_rounds_up() {
        let whole = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        assert_eq!(test_auction(whole).decryption_timestamp(), whole.timestamp() as u64);

        let fractional = whole + chrono::Duration::milliseconds(250);
        assert_eq!(
            test_auction(fractional).decryption_timestamp(),
            whole.timestamp() as u64 + 1
        );
    }

    #[test]
    fn test_auction_ended() {
        let expiration = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        let auction = test_auction(expiration);
        assert!(!auction.is_ended(expiration - chrono::Duration::seconds(1)));
        assert!(auction.is_ended(expiration));
    }

    #[test]
    fn test_plaintext_hex_roundtrip_keeps_field_order() {
        let plaintext = BidPlaintext {
            name: "Alice".to_string(),
            email: "@alice".to_string(),
            wallet_address: "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string(),
            bid_amount: "123.45".to_string(),
            auction_slug: "devconnect".to_string(),
            timestamp: 1_700_000_000_000,
        };
        let json = String::from_utf8(plaintext.to_json_bytes()).unwrap();
        assert!(json.starts_with(r#"{"name":"Alice","email":"@alice","walletAddress""#));
        assert_eq!(BidPlaintext::from_hex(&plaintext.to_hex()).unwrap(), plaintext);
    }

    #[test]
    fn test_compare_amounts() {
        assert_eq!(compare_amounts("123.45", "123.450"), Ordering::Equal);
        assert_eq!(compare_amounts("99.9", "100"), Ordering::Less);
        assert_eq!(compare_amounts("0100", "99.999999999999999999"), Ordering::Greater);
        assert_eq!(compare_amounts("1.000000000000000001", "1"), Ordering::Greater);
    }

    #[test]
    fn test_decryption_time_helpers() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ts = now.timestamp() as u64;
        assert!(decryption_time_reached(ts, now));
        assert!(!decryption_time_reached(ts + 1, now));
        assert_eq!(format_decryption_time(ts), "2025-01-01 00:00:00 UTC");
    }
}
