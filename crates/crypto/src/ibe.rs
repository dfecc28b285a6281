//! Identity-based encryption of bids using BLS12-381 pairings.
//!
//! This is a Fujisaki-Okamoto style variant of Boneh-Franklin IBE in which
//! the caller supplies the blinding value `sigma`, so encryption is
//! deterministic for identical inputs.
//!
//! # Encryption
//!
//! To encrypt a message `m` to identity `id` under eon key `EK = s·G2`:
//! 1. r = H3(sigma, m)
//! 2. C1 = r·G2
//! 3. C2 = sigma ⊕ H2(e(H1(id), EK)^r)
//! 4. C3 = pad(m) ⊕ H4(sigma), block by block
//!
//! # Decryption
//!
//! Given decryption key `K = s·H1(id)`:
//! 1. sigma = C2 ⊕ H2(e(K, C1))
//! 2. m = unpad(C3 ⊕ H4(sigma))
//! 3. Reject unless H3(sigma, m)·G2 = C1
//!
//! # Wire format
//!
//! `0x03 || C1 (96 bytes) || C2 (32 bytes) || C3 (n * 32 bytes)`

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Gt, Scalar};
use group::Curve;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use auction_types::{decode_hex, encode_hex};

use crate::error::CryptoError;
use crate::keys::{decompress_g2, DecryptionKey, EonKey};

/// Version byte prefixed to every serialized ciphertext.
pub const CIPHERTEXT_VERSION: u8 = 0x03;

/// Size of C2 and of each C3 block.
pub const BLOCK_SIZE: usize = 32;

const G2_COMPRESSED_LEN: usize = 96;

/// Per-encryption blinding value.
///
/// Must be fresh for every call; reusing it with a different message leaks
/// the XOR of both plaintexts.
#[derive(Clone, PartialEq, Eq)]
pub struct Sigma(pub [u8; 32]);

impl Sigma {
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }
}

impl std::fmt::Debug for Sigma {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sigma(..)")
    }
}

/// A bid sealed to an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedCiphertext {
    /// r·G2
    pub c1: G2Affine,
    /// Masked sigma
    pub c2: [u8; BLOCK_SIZE],
    /// Masked, padded message blocks
    pub c3: Vec<[u8; BLOCK_SIZE]>,
}

impl SealedCiphertext {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + G2_COMPRESSED_LEN + BLOCK_SIZE * (1 + self.c3.len()));
        out.push(CIPHERTEXT_VERSION);
        out.extend_from_slice(&self.c1.to_compressed());
        out.extend_from_slice(&self.c2);
        for block in &self.c3 {
            out.extend_from_slice(block);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let (&version, rest) = bytes
            .split_first()
            .ok_or(CryptoError::InvalidCiphertextFormat)?;
        if version != CIPHERTEXT_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }

        // C1, C2 and at least one message block
        if rest.len() < G2_COMPRESSED_LEN + 2 * BLOCK_SIZE
            || (rest.len() - G2_COMPRESSED_LEN) % BLOCK_SIZE != 0
        {
            return Err(CryptoError::InvalidCiphertextFormat);
        }

        let (c1_bytes, rest) = rest.split_at(G2_COMPRESSED_LEN);
        let c1_bytes: &[u8; G2_COMPRESSED_LEN] = c1_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidCiphertextFormat)?;
        let c1 = decompress_g2(c1_bytes)?;

        let (c2_bytes, rest) = rest.split_at(BLOCK_SIZE);
        let mut c2 = [0u8; BLOCK_SIZE];
        c2.copy_from_slice(c2_bytes);

        let c3 = rest
            .chunks_exact(BLOCK_SIZE)
            .map(|chunk| {
                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(chunk);
                block
            })
            .collect();

        Ok(Self { c1, c2, c3 })
    }

    pub fn to_hex(&self) -> String {
        encode_hex(self.to_bytes())
    }

    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_hex(value)?)
    }
}

/// Encrypt a message to an identity.
///
/// # Arguments
/// * `eon_key` - Public eon key of the encryption network
/// * `identity` - Identity bytes returned by identity registration
/// * `message` - The plaintext
/// * `sigma` - Fresh blinding value
pub fn encrypt(
    eon_key: &EonKey,
    identity: &[u8],
    message: &[u8],
    sigma: &Sigma,
) -> Result<SealedCiphertext, CryptoError> {
    let r = h3(sigma, message);
    let c1 = (G2Projective::generator() * r).to_affine();

    // e(H(id), EK)^r = e(r·H(id), EK)
    let id_hash = hash_to_g1(identity);
    let r_id_hash = (G1Projective::from(id_hash) * r).to_affine();
    let key_element = pairing(&r_id_hash, &eon_key.0);

    let mask = h2(&key_element)?;
    let c2 = xor_block(&sigma.0, &mask);

    let c3 = pad(message)
        .iter()
        .enumerate()
        .map(|(index, block)| xor_block(block, &h4(sigma, index as u64)))
        .collect();

    Ok(SealedCiphertext { c1, c2, c3 })
}

/// Decrypt a ciphertext with the decryption key released for its identity.
pub fn decrypt(
    ciphertext: &SealedCiphertext,
    decryption_key: &DecryptionKey,
) -> Result<Vec<u8>, CryptoError> {
    // e(s·H(id), r·G2) = e(H(id), s·G2)^r
    let key_element = pairing(&decryption_key.0, &ciphertext.c1);
    let mask = h2(&key_element)?;
    let sigma = Sigma(xor_block(&ciphertext.c2, &mask));

    let blocks: Vec<[u8; BLOCK_SIZE]> = ciphertext
        .c3
        .iter()
        .enumerate()
        .map(|(index, block)| xor_block(block, &h4(&sigma, index as u64)))
        .collect();
    let message = unpad(&blocks)?;

    let r = h3(&sigma, &message);
    if (G2Projective::generator() * r).to_affine() != ciphertext.c1 {
        return Err(CryptoError::AuthenticationFailed);
    }

    Ok(message)
}

/// Hex-level entry point: encrypt a `0x` hex message to a hex identity.
pub fn encrypt_hex(
    message_hex: &str,
    identity_hex: &str,
    eon_key_hex: &str,
    sigma: &Sigma,
) -> Result<String, CryptoError> {
    let message = decode_hex(message_hex)?;
    let identity = decode_hex(identity_hex)?;
    let eon_key = EonKey::from_hex(eon_key_hex)?;
    Ok(encrypt(&eon_key, &identity, &message, sigma)?.to_hex())
}

/// Hex-level entry point: decrypt a `0x` hex ciphertext with a hex key.
pub fn decrypt_hex(ciphertext_hex: &str, decryption_key_hex: &str) -> Result<Vec<u8>, CryptoError> {
    let ciphertext = SealedCiphertext::from_hex(ciphertext_hex)?;
    let key = DecryptionKey::from_hex(decryption_key_hex)?;
    decrypt(&ciphertext, &key)
}

/// Hash arbitrary data to a G1 point.
pub fn hash_to_g1(data: &[u8]) -> G1Affine {
    // Try-and-increment onto a scalar multiple of the generator.
    let mut counter = 0u64;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(b"SEALED_BID_H1_BLS12381G1:");
        hasher.update(data);
        hasher.update(counter.to_le_bytes());
        let hash: [u8; 32] = hasher.finalize().into();

        let scalar: Option<Scalar> = Scalar::from_bytes(&hash).into();
        if let Some(scalar) = scalar {
            return (G1Projective::generator() * scalar).to_affine();
        }
        counter += 1;
    }
}

/// H2: mask derived from the pairing output.
fn h2(gt: &Gt) -> Result<[u8; BLOCK_SIZE], CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, &gt_to_bytes(gt));
    let mut mask = [0u8; BLOCK_SIZE];
    hk.expand(b"SEALED_BID_H2", &mut mask)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(mask)
}

/// H3: encryption randomness bound to both sigma and the message.
fn h3(sigma: &Sigma, message: &[u8]) -> Scalar {
    let mut wide = [0u8; 64];
    for (half, chunk) in wide.chunks_exact_mut(32).enumerate() {
        let mut hasher = Sha256::new();
        hasher.update(b"SEALED_BID_H3");
        hasher.update([half as u8]);
        hasher.update(sigma.0);
        hasher.update(message);
        chunk.copy_from_slice(&hasher.finalize());
    }
    Scalar::from_bytes_wide(&wide)
}

/// H4: keystream block `index` derived from sigma.
fn h4(sigma: &Sigma, index: u64) -> [u8; BLOCK_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(b"SEALED_BID_H4");
    hasher.update(sigma.0);
    hasher.update(index.to_be_bytes());
    hasher.finalize().into()
}

/// Serialize a GT element to bytes.
fn gt_to_bytes(gt: &Gt) -> Vec<u8> {
    // bls12_381 exposes no canonical GT encoding; hash the field representation.
    let mut hasher = Sha256::new();
    hasher.update(format!("{:?}", gt).as_bytes());
    hasher.finalize().to_vec()
}

/// PKCS#7 padding to whole blocks. Always adds between 1 and 32 bytes.
fn pad(message: &[u8]) -> Vec<[u8; BLOCK_SIZE]> {
    let pad_len = BLOCK_SIZE - message.len() % BLOCK_SIZE;
    let mut padded = message.to_vec();
    padded.resize(message.len() + pad_len, pad_len as u8);
    padded
        .chunks_exact(BLOCK_SIZE)
        .map(|chunk| {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            block
        })
        .collect()
}

fn unpad(blocks: &[[u8; BLOCK_SIZE]]) -> Result<Vec<u8>, CryptoError> {
    let padded: Vec<u8> = blocks.iter().flatten().copied().collect();
    let pad_len = *padded.last().ok_or(CryptoError::InvalidPadding)? as usize;
    if pad_len == 0 || pad_len > BLOCK_SIZE || pad_len > padded.len() {
        return Err(CryptoError::InvalidPadding);
    }
    let (message, padding) = padded.split_at(padded.len() - pad_len);
    if padding.iter().any(|&b| b as usize != pad_len) {
        return Err(CryptoError::InvalidPadding);
    }
    Ok(message.to_vec())
}

fn xor_block(a: &[u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = a[i] ^ b[i];
    }
    out
}
