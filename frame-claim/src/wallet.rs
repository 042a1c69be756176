//! Wallets and the wallet list.
//!
//! A wallet is a named Ethereum-style account. The list of wallets to claim
//! for is kept in a TOML file, in the order the user added them:
//!
//! ```toml
//! [[wallet]]
//! name = "main"
//! address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::StorageError;

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn hex_digits(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form for tables, e.g. `0x7e5f...5bdf`.
    pub fn short(&self) -> String {
        let digits = self.hex_digits();
        format!("0x{}...{}", &digits[..4], &digits[36..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.hex_digits())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Error parsing a hex address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0:?}")]
pub struct ParseAddressError(String);

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| ParseAddressError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = ParseAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// A named account. The name is a label only and need not be unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub name: String,
    pub address: Address,
}

impl Wallet {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    pub fn short_address(&self) -> String {
        self.address.short()
    }
}

/// Source of the wallets to process, in processing order.
pub trait WalletStore {
    fn list(&self) -> Result<Vec<Wallet>, StorageError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WalletFile {
    #[serde(default, rename = "wallet")]
    wallets: Vec<Wallet>,
}

/// Wallet list backed by a TOML file.
#[derive(Debug, Clone)]
pub struct FileWalletStore {
    path: PathBuf,
}

impl FileWalletStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a wallet and write the file back, creating it if needed.
    pub fn add(&self, wallet: Wallet) -> Result<(), StorageError> {
        let mut file = match self.read() {
            Ok(file) => file,
            Err(StorageError::NotFound(_)) => WalletFile::default(),
            Err(e) => return Err(e),
        };
        file.wallets.push(wallet);
        self.write(&file)
    }

    fn read(&self) -> Result<WalletFile, StorageError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(self.path.clone())
            } else {
                StorageError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        toml::from_str(&contents).map_err(|e| StorageError::Parse(e.to_string()))
    }

    fn write(&self, file: &WalletFile) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let contents =
            toml::to_string_pretty(file).map_err(|e| StorageError::Serialize(e.to_string()))?;
        fs::write(&self.path, contents).map_err(io_err)
    }
}

impl WalletStore for FileWalletStore {
    fn list(&self) -> Result<Vec<Wallet>, StorageError> {
        Ok(self.read()?.wallets)
    }
}
