//! Wallet access for signing bid attestations.

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use thiserror::Error;

use auction_types::{encode_hex, WalletAddress};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Signature request was rejected")]
    Rejected,

    #[error("Signing failed: {0}")]
    Signer(String),
}

/// The connected account of a bidder.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Address of the connected account, `None` when disconnected.
    fn address(&self) -> Option<WalletAddress>;

    /// Sign `message` with EIP-191 `personal_sign`, returning `0x` hex.
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;
}

/// Wallet backed by a local secp256k1 key.
#[derive(Debug, Clone, Default)]
pub struct LocalWallet {
    signer: Option<PrivateKeySigner>,
}

impl LocalWallet {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connect with a hex private key, with or without `0x`.
    pub fn from_private_key(key: &str) -> Result<Self, WalletError> {
        let mut wallet = Self::disconnected();
        wallet.connect(key)?;
        Ok(wallet)
    }

    pub fn connect(&mut self, key: &str) -> Result<(), WalletError> {
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| WalletError::Signer(e.to_string()))?;
        self.signer = Some(signer);
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.signer = None;
    }
}

#[async_trait]
impl WalletConnector for LocalWallet {
    fn address(&self) -> Option<WalletAddress> {
        let signer = self.signer.as_ref()?;
        WalletAddress::parse(signer.address().to_checksum(None)).ok()
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let signer = self.signer.as_ref().ok_or(WalletError::NotConnected)?;
        let signature = signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| WalletError::Signer(e.to_string()))?;
        Ok(encode_hex(signature.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Signature;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_address_is_checksummed() {
        let wallet = LocalWallet::from_private_key(TEST_KEY).unwrap();
        assert_eq!(wallet.address().unwrap().as_str(), TEST_ADDRESS);
    }

    #[test]
    fn test_disconnected_has_no_address() {
        let mut wallet = LocalWallet::from_private_key(TEST_KEY).unwrap();
        wallet.disconnect();
        assert!(wallet.address().is_none());
        assert!(LocalWallet::disconnected().address().is_none());
    }

    #[test]
    fn test_bad_key_is_signer_error() {
        assert!(matches!(
            LocalWallet::from_private_key("0x1234"),
            Err(WalletError::Signer(_))
        ));
    }

    #[tokio::test]
    async fn test_signature_recovers_to_address() {
        let wallet = LocalWallet::from_private_key(TEST_KEY).unwrap();
        let message = "Sealed Bid Submission\n\nAuction: devconnect";
        let signature_hex = wallet.sign_message(message).await.unwrap();

        assert_eq!(signature_hex.len(), 2 + 65 * 2);
        let signature: Signature = signature_hex.parse().unwrap();
        let recovered = signature.recover_address_from_msg(message).unwrap();
        assert_eq!(recovered.to_checksum(None), TEST_ADDRESS);
    }

    #[tokio::test]
    async fn test_disconnected_cannot_sign() {
        let wallet = LocalWallet::disconnected();
        assert_eq!(
            wallet.sign_message("hello").await,
            Err(WalletError::NotConnected)
        );
    }
}
