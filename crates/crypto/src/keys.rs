//! Eon keys and per-identity decryption keys.
//!
//! The encryption network holds an eon secret `s` (shared among keypers in
//! the real network). The public eon key is `s·G2`. Once an identity's
//! decryption time has passed, the network releases `s·H1(identity)` in G1,
//! which is the key that opens every ciphertext sealed to that identity.

use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use group::Curve;
use rand::{CryptoRng, RngCore};

use auction_types::{decode_hex, encode_hex};

use crate::error::CryptoError;
use crate::ibe::hash_to_g1;

/// Public eon key: a compressed G2 point on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EonKey(pub G2Affine);

impl EonKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: &[u8; 96] = bytes.try_into().map_err(|_| CryptoError::InvalidG2Point)?;
        Ok(Self(decompress_g2(bytes)?))
    }

    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_hex(value)?)
    }

    pub fn to_hex(&self) -> String {
        encode_hex(self.0.to_compressed())
    }
}

/// Released decryption key for one identity: a compressed G1 point on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptionKey(pub G1Affine);

impl DecryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: &[u8; 48] = bytes.try_into().map_err(|_| CryptoError::InvalidG1Point)?;
        Ok(Self(decompress_g1(bytes)?))
    }

    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_hex(value)?)
    }

    pub fn to_hex(&self) -> String {
        encode_hex(self.0.to_compressed())
    }
}

/// Network-side eon secret. Only the mock network and tests hold one.
#[derive(Clone)]
pub struct EonSecret(Scalar);

impl EonSecret {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(random_scalar(rng))
    }

    /// Public eon key `s·G2`.
    pub fn eon_key(&self) -> EonKey {
        EonKey((G2Projective::generator() * self.0).to_affine())
    }

    /// Decryption key `s·H1(identity)`.
    pub fn decryption_key(&self, identity: &[u8]) -> DecryptionKey {
        let id_point = hash_to_g1(identity);
        DecryptionKey((G1Projective::from(id_point) * self.0).to_affine())
    }
}

impl std::fmt::Debug for EonSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EonSecret(..)")
    }
}

/// Generate a random scalar.
fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_wide(&bytes)
}

/// Decompress a G1 point from bytes.
pub fn decompress_g1(bytes: &[u8; 48]) -> Result<G1Affine, CryptoError> {
    Option::from(G1Affine::from_compressed(bytes)).ok_or(CryptoError::InvalidG1Point)
}

/// Decompress a G2 point from bytes.
pub fn decompress_g2(bytes: &[u8; 96]) -> Result<G2Affine, CryptoError> {
    Option::from(G2Affine::from_compressed(bytes)).ok_or(CryptoError::InvalidG2Point)
}
