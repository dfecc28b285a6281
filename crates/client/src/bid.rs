//! Bid creation and encryption.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

use auction_crypto::{decrypt_hex, encrypt_hex, CryptoError, Sigma};
use auction_types::{BidPlaintext, EncryptionIdentity};

/// Errors that can occur during bid creation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidError {
    #[error("Invalid encryption material: {0}")]
    Encoding(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
}

impl From<CryptoError> for BidError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidHex(_) | CryptoError::InvalidG2Point | CryptoError::InvalidG1Point => {
                BidError::Encoding(err.to_string())
            }
            other => BidError::EncryptionFailed(other.to_string()),
        }
    }
}

/// A sealed bid ready to be signed and submitted.
#[derive(Debug, Clone)]
pub struct PreparedBid {
    /// `0x` hex ciphertext
    pub ciphertext: String,
    /// The plaintext that was sealed (keep secret)
    pub plaintext: BidPlaintext,
}

/// Seal a plaintext bid to the identity of a registered prefix.
///
/// # Arguments
/// * `plaintext` - The bid to seal
/// * `identity` - Identity and eon key returned by the encryption network
/// * `rng` - Source of the blinding value, drawn fresh on every call
pub fn create_bid<R: RngCore + CryptoRng>(
    plaintext: BidPlaintext,
    identity: &EncryptionIdentity,
    rng: &mut R,
) -> Result<PreparedBid, BidError> {
    let sigma = Sigma::random(rng);
    let ciphertext = encrypt_hex(
        &plaintext.to_hex(),
        &identity.identity,
        &identity.eon_key,
        &sigma,
    )?;

    Ok(PreparedBid {
        ciphertext,
        plaintext,
    })
}

/// Open a sealed bid with the decryption key released after the reveal time.
pub fn open_bid(ciphertext_hex: &str, decryption_key_hex: &str) -> Result<BidPlaintext, BidError> {
    let bytes = decrypt_hex(ciphertext_hex, decryption_key_hex)?;
    BidPlaintext::from_json_bytes(&bytes).map_err(|e| BidError::Encoding(e.to_string()))
}
