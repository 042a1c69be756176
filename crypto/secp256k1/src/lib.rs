// Copyright (c) 2024 The Frame Claim Developers

#![deny(unsafe_code)]

//! Secp256k1 keys for Ethereum-style accounts.
//!
//! This crate wraps a secp256k1 signing key and exposes the two operations
//! an account holder needs: deriving the 20-byte Ethereum address of the key
//! and producing recoverable ECDSA signatures over a 32-byte prehash.
//!
//! Signatures are returned as `r (32) || s (32) || recid (1)` where `recid`
//! is the raw recovery id (0 or 1). Callers that speak the legacy wire
//! encoding add 27 themselves.
//!
//! # Examples
//!
//! ```
//! use fc_crypto_secp256k1::{recover_address, Secp256k1Keypair};
//!
//! let keypair = Secp256k1Keypair::from_bytes(&[0x11; 32]).unwrap();
//! let hash = [0x42; 32];
//!
//! let signature = keypair.sign_hash(&hash).unwrap();
//! assert_eq!(signature.len(), 65);
//! assert!(signature[64] <= 1);
//!
//! assert_eq!(recover_address(&hash, &signature), Some(keypair.eth_address_bytes()));
//! ```

use k256::{
    ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey},
    SecretKey,
};
use sha3::{Digest, Keccak256};
use zeroize::ZeroizeOnDrop;

/// Errors that can occur during key operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Signing failed: {0}")]
    SigningError(String),
}

/// A secp256k1 keypair for Ethereum-compatible operations.
#[derive(Clone, ZeroizeOnDrop)]
pub struct Secp256k1Keypair {
    #[zeroize(skip)] // SigningKey implements its own zeroization
    signing_key: SigningKey,
}

impl core::fmt::Debug for Secp256k1Keypair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Secp256k1Keypair {{ address: 0x{} }}",
            hex::encode(self.eth_address_bytes())
        )
    }
}

impl Secp256k1Keypair {
    /// Create a keypair from raw 32-byte private key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, Error> {
        let secret_key =
            SecretKey::from_bytes(bytes.into()).map_err(|_| Error::InvalidPrivateKey)?;

        Ok(Self {
            signing_key: SigningKey::from(secret_key),
        })
    }

    /// Create a keypair from a hex-encoded private key, with or without a
    /// `0x` prefix.
    pub fn from_hex(hex_key: &str) -> Result<Self, Error> {
        let trimmed = hex_key.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let mut bytes = zeroize::Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(digits, &mut bytes[..]).map_err(|_| Error::InvalidPrivateKey)?;

        Self::from_bytes(&bytes)
    }

    /// Get the public key as uncompressed bytes (65 bytes: 0x04 || x || y).
    pub fn public_key_uncompressed(&self) -> [u8; 65] {
        encode_uncompressed(self.signing_key.verifying_key())
    }

    /// Get the raw 20-byte Ethereum address.
    ///
    /// The address is the last 20 bytes of keccak256 over the 64-byte
    /// uncompressed public key (without the 0x04 prefix).
    pub fn eth_address_bytes(&self) -> [u8; 20] {
        address_from_public_key(&self.public_key_uncompressed())
    }

    /// Sign a raw 32-byte hash.
    ///
    /// Returns a 65-byte signature: r (32) || s (32) || recid (1).
    pub fn sign_hash(&self, hash: &[u8; 32]) -> Result<[u8; 65], Error> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| Error::SigningError(e.to_string()))?;

        let mut result = [0u8; 65];
        result[..64].copy_from_slice(&signature.to_bytes());
        result[64] = recovery_id.to_byte();
        Ok(result)
    }
}

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn encode_uncompressed(verifying_key: &VerifyingKey) -> [u8; 65] {
    let point = verifying_key.to_encoded_point(false);
    let mut result = [0u8; 65];
    result.copy_from_slice(point.as_bytes());
    result
}

fn address_from_public_key(public_key: &[u8; 65]) -> [u8; 20] {
    let hash = keccak256(&public_key[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Recover the public key from a signature and message hash.
///
/// Accepts both the raw (0/1) and the legacy (27/28) recovery id encoding.
pub fn recover_public_key(hash: &[u8; 32], signature: &[u8; 65]) -> Option<[u8; 65]> {
    let r_s: [u8; 64] = signature[..64].try_into().ok()?;
    let v = signature[64];

    let recovery_id = if v >= 27 {
        RecoveryId::try_from(v - 27).ok()?
    } else {
        RecoveryId::try_from(v).ok()?
    };

    let sig = K256Signature::from_slice(&r_s).ok()?;
    let verifying_key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id).ok()?;

    Some(encode_uncompressed(&verifying_key))
}

/// Recover the Ethereum address that produced `signature` over `hash`.
pub fn recover_address(hash: &[u8; 32], signature: &[u8; 65]) -> Option<[u8; 20]> {
    recover_public_key(hash, signature).map(|pubkey| address_from_public_key(&pubkey))
}
