//! Import a private key into the key store

use anyhow::{Context, Result};
use std::path::Path;
use zeroize::Zeroizing;

use crate::config::Config;
use crate::keystore::Keystore;
use crate::wallet::{FileWalletStore, Wallet};

use super::{print_success, prompt_new_password, prompt_password};

/// Run the import command. The first import also writes the config file so
/// it can be edited afterwards.
pub async fn run(config: &Config, config_path: &Path, name: &str) -> Result<()> {
    let secret = prompt_password("Private key (hex): ")?;

    let probe = Keystore::open(&config.keystore_dir, Zeroizing::new(String::new()));
    let existing = probe
        .accounts()
        .context("Failed to read key store")?
        .len();

    // All keys share one passphrase, so an existing store must accept it.
    let passphrase = if existing == 0 {
        prompt_new_password()?
    } else {
        prompt_password("Enter key store passphrase: ")?
    };

    let mut keystore = Keystore::open(&config.keystore_dir, passphrase);
    if existing > 0 {
        keystore
            .unlock_all()
            .context("Passphrase does not unlock the existing key store")?;
    }

    let address = keystore.import(&secret).context("Failed to import key")?;

    let store = FileWalletStore::new(&config.wallets_file);
    store
        .add(Wallet::new(name, address))
        .context("Failed to update wallet list")?;

    if !Config::exists(config_path) {
        config.save(config_path)?;
        println!("Config saved to: {}", config_path.display());
    }

    println!();
    print_success(&format!("Imported {} as '{}'", address, name));

    Ok(())
}
