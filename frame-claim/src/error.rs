//! Error types shared across the claim pipeline.
//!
//! Run-level failures (`StorageError`) abort the whole run before any wallet
//! is touched. Per-wallet failures (`SignError`, and `ApiError` from the
//! client) are caught by the claimer and turned into a result row.

use std::io;
use std::path::PathBuf;

use crate::wallet::Address;

/// The wallet list could not be obtained.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("wallet list not found at {0}")]
    NotFound(PathBuf),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse wallet list: {0}")]
    Parse(String),

    #[error("failed to serialize wallet list: {0}")]
    Serialize(String),
}

/// A wallet's challenge could not be signed.
#[derive(Debug, thiserror::Error)]
pub enum SignError {
    /// The account is unknown to the key store or has not been unlocked.
    #[error("access denied for {0}: account is locked or unknown")]
    AccessDenied(Address),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<fc_crypto_secp256k1::Error> for SignError {
    fn from(err: fc_crypto_secp256k1::Error) -> Self {
        SignError::Signing(err.to_string())
    }
}
