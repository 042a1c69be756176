//! Encrypted Key Store
//!
//! Holds one secp256k1 private key per file, encrypted with the key store
//! passphrase using:
//! - Argon2id for password-based key derivation
//! - ChaCha20-Poly1305 for authenticated encryption
//!
//! The whole store is unlocked once, before any wallet is processed. After
//! that it is only read.

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHasher,
};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use fc_crypto_secp256k1::Secp256k1Keypair;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::SignError;
use crate::wallet::Address;

/// Current key file format version
const KEYFILE_VERSION: u32 = 1;

/// Argon2 parameters
const ARGON2_MEMORY_KB: u32 = 65536; // 64 MB
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 4;

const KEYFILE_EXTENSION: &str = "json";

/// Signs 32-byte digests on behalf of an account.
pub trait Signer {
    /// Returns `r || s || recid`. Fails with `AccessDenied` when the account
    /// is unknown or locked.
    fn sign(&self, address: &Address, digest: &[u8; 32]) -> Result<[u8; 65], SignError>;
}

#[derive(Debug, thiserror::Error)]
pub enum KeystoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse key file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported key file version: {0} (expected {KEYFILE_VERSION})")]
    UnsupportedVersion(u32),

    #[error("failed to decrypt key for {0} - wrong passphrase?")]
    Decrypt(Address),

    #[error("key file for {expected} holds the key of {actual}")]
    AddressMismatch { expected: Address, actual: Address },

    #[error("key for {0} already exists")]
    AlreadyExists(Address),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] fc_crypto_secp256k1::Error),

    #[error("{0}")]
    Crypto(&'static str),
}

/// Encrypted key file structure
#[derive(Serialize, Deserialize)]
pub struct EncryptedKey {
    /// File format version
    version: u32,

    /// Account address the key belongs to
    pub address: Address,

    /// Argon2 salt (base64 encoded)
    salt: String,

    /// ChaCha20-Poly1305 nonce (12 bytes, hex encoded)
    nonce: String,

    /// Encrypted private key (hex encoded)
    ciphertext: String,
}

impl EncryptedKey {
    /// Encrypt a keypair's private key with a passphrase
    pub fn encrypt(secret: &[u8; 32], passphrase: &str) -> Result<Self, KeystoreError> {
        let address = Address::new(Secp256k1Keypair::from_bytes(secret)?.eth_address_bytes());

        let salt = SaltString::generate(&mut OsRng);
        let key = derive_key(passphrase, salt.as_str())?;

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill(&mut nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|_| KeystoreError::Crypto("Failed to create cipher"))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, secret.as_slice())
            .map_err(|_| KeystoreError::Crypto("Encryption failed"))?;

        Ok(Self {
            version: KEYFILE_VERSION,
            address,
            salt: salt.to_string(),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Decrypt the private key and check it belongs to the recorded address
    pub fn decrypt(&self, passphrase: &str) -> Result<Secp256k1Keypair, KeystoreError> {
        if self.version != KEYFILE_VERSION {
            return Err(KeystoreError::UnsupportedVersion(self.version));
        }

        let key = derive_key(passphrase, &self.salt)?;

        let nonce_bytes =
            hex::decode(&self.nonce).map_err(|_| KeystoreError::Crypto("Invalid nonce format"))?;
        let ciphertext = hex::decode(&self.ciphertext)
            .map_err(|_| KeystoreError::Crypto("Invalid ciphertext format"))?;

        if nonce_bytes.len() != 12 {
            return Err(KeystoreError::Crypto("Invalid nonce length"));
        }

        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|_| KeystoreError::Crypto("Failed to create cipher"))?;

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(nonce, ciphertext.as_slice())
                .map_err(|_| KeystoreError::Decrypt(self.address))?,
        );

        let secret: Zeroizing<[u8; 32]> = Zeroizing::new(
            plaintext
                .as_slice()
                .try_into()
                .map_err(|_| KeystoreError::Crypto("Invalid key length"))?,
        );

        let keypair = Secp256k1Keypair::from_bytes(&secret)?;
        let actual = Address::new(keypair.eth_address_bytes());
        if actual != self.address {
            return Err(KeystoreError::AddressMismatch {
                expected: self.address,
                actual,
            });
        }

        Ok(keypair)
    }

    /// Save the key file with restricted permissions
    pub fn save(&self, path: &Path) -> Result<(), KeystoreError> {
        let io_err = |source| KeystoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| KeystoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(path)
                .map_err(io_err)?;
            file.write_all(json.as_bytes()).map_err(io_err)?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, json).map_err(io_err)?;
        }

        Ok(())
    }

    /// Load a key file
    pub fn load(path: &Path) -> Result<Self, KeystoreError> {
        let json = fs::read_to_string(path).map_err(|source| KeystoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&json).map_err(|e| KeystoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Directory of encrypted keys, unlocked with a single passphrase.
pub struct Keystore {
    dir: PathBuf,
    passphrase: Zeroizing<String>,
    unlocked: HashMap<Address, Secp256k1Keypair>,
}

impl Keystore {
    /// Open a key store. Nothing is decrypted until [`Keystore::unlock_all`].
    pub fn open(dir: impl Into<PathBuf>, passphrase: Zeroizing<String>) -> Self {
        Self {
            dir: dir.into(),
            passphrase,
            unlocked: HashMap::new(),
        }
    }

    fn key_path(&self, address: &Address) -> PathBuf {
        self.dir
            .join(format!("{}.{}", address.hex_digits(), KEYFILE_EXTENSION))
    }

    /// Paths of all key files in the store. A missing directory is empty.
    fn key_files(&self) -> Result<Vec<PathBuf>, KeystoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(KeystoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| KeystoreError::Io {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) == Some(KEYFILE_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Addresses with a key file in the store.
    pub fn accounts(&self) -> Result<Vec<Address>, KeystoreError> {
        self.key_files()?
            .iter()
            .map(|path| EncryptedKey::load(path).map(|key| key.address))
            .collect()
    }

    /// Encrypt a hex private key into the store and return its address.
    pub fn import(&self, secret_hex: &str) -> Result<Address, KeystoreError> {
        let trimmed = secret_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let mut secret = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(digits, &mut secret[..])
            .map_err(|_| KeystoreError::InvalidKey(fc_crypto_secp256k1::Error::InvalidPrivateKey))?;

        let encrypted = EncryptedKey::encrypt(&secret, &self.passphrase)?;
        let path = self.key_path(&encrypted.address);
        if path.exists() {
            return Err(KeystoreError::AlreadyExists(encrypted.address));
        }

        encrypted.save(&path)?;
        debug!("Stored key for {}", encrypted.address);
        Ok(encrypted.address)
    }

    /// Decrypt every key in the store. Any key that fails to open fails the
    /// whole unlock. Returns the number of unlocked accounts.
    pub fn unlock_all(&mut self) -> Result<usize, KeystoreError> {
        let mut unlocked = HashMap::new();
        for path in self.key_files()? {
            let encrypted = EncryptedKey::load(&path)?;
            let keypair = encrypted.decrypt(&self.passphrase)?;
            unlocked.insert(encrypted.address, keypair);
        }

        debug!("Unlocked {} accounts in {}", unlocked.len(), self.dir.display());
        self.unlocked = unlocked;
        Ok(self.unlocked.len())
    }

    pub fn is_unlocked(&self, address: &Address) -> bool {
        self.unlocked.contains_key(address)
    }
}

impl Signer for Keystore {
    fn sign(&self, address: &Address, digest: &[u8; 32]) -> Result<[u8; 65], SignError> {
        let keypair = self
            .unlocked
            .get(address)
            .ok_or(SignError::AccessDenied(*address))?;

        Ok(keypair.sign_hash(digest)?)
    }
}

/// Derive a 32-byte encryption key from a passphrase using Argon2id
fn derive_key(passphrase: &str, salt: &str) -> Result<Zeroizing<[u8; 32]>, KeystoreError> {
    let salt = SaltString::from_b64(salt).map_err(|_| KeystoreError::Crypto("Invalid salt format"))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon2::Params::new(
            ARGON2_MEMORY_KB,
            ARGON2_ITERATIONS,
            ARGON2_PARALLELISM,
            Some(32),
        )
        .map_err(|_| KeystoreError::Crypto("Invalid Argon2 parameters"))?,
    );

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|_| KeystoreError::Crypto("Key derivation failed"))?;

    let hash_output = hash
        .hash
        .ok_or(KeystoreError::Crypto("No hash output"))?;

    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&hash_output.as_bytes()[..32]);

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::challenge_digest;
    use fc_crypto_secp256k1::recover_address;
    use tempfile::TempDir;

    const TEST_PASSPHRASE: &str = "test-passphrase-123";
    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn passphrase(value: &str) -> Zeroizing<String> {
        Zeroizing::new(value.to_string())
    }

    #[test]
    fn test_encrypt_decrypt() {
        let secret = [0x11u8; 32];
        let encrypted = EncryptedKey::encrypt(&secret, TEST_PASSPHRASE).unwrap();
        let keypair = encrypted.decrypt(TEST_PASSPHRASE).unwrap();

        assert_eq!(Address::new(keypair.eth_address_bytes()), encrypted.address);
    }

    #[test]
    fn test_wrong_passphrase() {
        let encrypted = EncryptedKey::encrypt(&[0x11u8; 32], TEST_PASSPHRASE).unwrap();
        assert!(matches!(
            encrypted.decrypt("wrong-passphrase"),
            Err(KeystoreError::Decrypt(_))
        ));
    }

    #[test]
    fn test_import_and_unlock() {
        let temp_dir = TempDir::new().unwrap();
        let mut keystore = Keystore::open(temp_dir.path(), passphrase(TEST_PASSPHRASE));

        let address = keystore.import(TEST_KEY).unwrap();
        assert_eq!(keystore.accounts().unwrap(), vec![address]);
        assert!(!keystore.is_unlocked(&address));

        assert_eq!(keystore.unlock_all().unwrap(), 1);
        assert!(keystore.is_unlocked(&address));
    }

    #[test]
    fn test_import_duplicate_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::open(temp_dir.path(), passphrase(TEST_PASSPHRASE));

        keystore.import(TEST_KEY).unwrap();
        assert!(matches!(
            keystore.import(TEST_KEY),
            Err(KeystoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_unlock_with_wrong_passphrase_fails() {
        let temp_dir = TempDir::new().unwrap();
        Keystore::open(temp_dir.path(), passphrase(TEST_PASSPHRASE))
            .import(TEST_KEY)
            .unwrap();

        let mut keystore = Keystore::open(temp_dir.path(), passphrase("nope"));
        assert!(keystore.unlock_all().is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let mut keystore =
            Keystore::open(temp_dir.path().join("absent"), passphrase(TEST_PASSPHRASE));

        assert!(keystore.accounts().unwrap().is_empty());
        assert_eq!(keystore.unlock_all().unwrap(), 0);
    }

    #[test]
    fn test_sign_locked_or_unknown_is_access_denied() {
        let temp_dir = TempDir::new().unwrap();
        let keystore = Keystore::open(temp_dir.path(), passphrase(TEST_PASSPHRASE));
        let address = keystore.import(TEST_KEY).unwrap();

        // Imported but not unlocked.
        assert!(matches!(
            keystore.sign(&address, &[0u8; 32]),
            Err(SignError::AccessDenied(a)) if a == address
        ));

        // Unknown account.
        let unknown = Address::new([0xee; 20]);
        assert!(matches!(
            keystore.sign(&unknown, &[0u8; 32]),
            Err(SignError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_sign_recovers_to_account() {
        let temp_dir = TempDir::new().unwrap();
        let mut keystore = Keystore::open(temp_dir.path(), passphrase(TEST_PASSPHRASE));
        let address = keystore.import(TEST_KEY).unwrap();
        keystore.unlock_all().unwrap();

        let digest = challenge_digest(&address);
        let signature = keystore.sign(&address, &digest).unwrap();

        assert!(signature[64] <= 1);
        assert_eq!(recover_address(&digest, &signature), Some(*address.as_bytes()));
    }
}
