//! Threshold identity-based encryption for sealed bids.
//!
//! Bids are encrypted to an identity registered with an external threshold
//! encryption network, on the BLS12-381 curve.
//!
//! # Overview
//!
//! 1. **Registration**: The bidder registers an identity with the network,
//!    bound to a decryption timestamp, and receives the eon public key.
//!
//! 2. **Encryption**: Anyone can encrypt to that identity using only the eon
//!    key and a fresh blinding value. Nobody, the bidder included, can open
//!    the ciphertext before the network releases the identity's key.
//!
//! 3. **Key release**: Once the decryption timestamp passes, the network's
//!    keypers jointly produce `s·H(identity)` and publish it.
//!
//! 4. **Decryption**: Anyone holding the released key can open every
//!    ciphertext sealed to that identity.

pub mod error;
pub mod ibe;
pub mod keys;

pub use error::CryptoError;
pub use ibe::{decrypt, decrypt_hex, encrypt, encrypt_hex, SealedCiphertext, Sigma};
pub use keys::{DecryptionKey, EonKey, EonSecret};
