//! Challenge signing protocol
//!
//! The claim service authenticates a wallet by having it sign a fixed
//! challenge sentence with the Ethereum personal-sign scheme (EIP-191) and
//! checking the recovered address. The service expects the legacy `v`
//! encoding (27/28), so the raw recovery id from the signer is shifted by 27
//! before it goes on the wire.

use sha3::{Digest, Keccak256};
use std::fmt;

use crate::wallet::Address;

/// Challenge text preceding the lowercase address.
pub const CHALLENGE_PREFIX: &str =
    "You are claiming the Frame Chapter One Airdrop with the following address: ";

/// EIP-191 personal message prefix.
const PERSONAL_SIGN_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length of an `r || s || v` signature.
pub const SIGNATURE_LEN: usize = 65;

/// Offset added to the recovery id for the legacy encoding.
const LEGACY_V_OFFSET: u8 = 27;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid signature length: expected {SIGNATURE_LEN} bytes, got {0}")]
    InvalidSignatureLength(usize),
}

/// Build the challenge message for a hex address. The address is lowercased
/// regardless of how it was supplied.
pub fn build_challenge(address_hex: &str) -> String {
    format!("{}{}", CHALLENGE_PREFIX, address_hex.to_lowercase())
}

/// Personal-sign digest of a message:
/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`
/// where `len` is the decimal UTF-8 byte length of the message.
pub fn digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_SIGN_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Digest a wallet signs to authenticate.
pub fn challenge_digest(address: &Address) -> [u8; 32] {
    digest(&build_challenge(&address.to_string()))
}

/// A signature in the encoding the claim service verifies.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WireSignature([u8; SIGNATURE_LEN]);

impl WireSignature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex, as sent in the authenticate request.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for WireSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for WireSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireSignature({})", self.to_hex())
    }
}

/// Convert a raw `r || s || recid` signature to the wire encoding by adding
/// 27 to the final byte.
pub fn to_wire_signature(raw: &[u8]) -> Result<WireSignature, ProtocolError> {
    let mut bytes: [u8; SIGNATURE_LEN] = raw
        .try_into()
        .map_err(|_| ProtocolError::InvalidSignatureLength(raw.len()))?;

    bytes[SIGNATURE_LEN - 1] = bytes[SIGNATURE_LEN - 1].wrapping_add(LEGACY_V_OFFSET);
    Ok(WireSignature(bytes))
}
