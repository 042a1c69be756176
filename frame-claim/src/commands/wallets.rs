//! List wallets command

use anyhow::{Context, Result};

use crate::config::Config;
use crate::error::StorageError;
use crate::wallet::{FileWalletStore, WalletStore};

use super::{print_error, print_warning};

/// Run the wallets command
pub async fn run(config: &Config, full: bool) -> Result<()> {
    let store = FileWalletStore::new(&config.wallets_file);
    let wallets = match store.list() {
        Ok(wallets) => wallets,
        Err(StorageError::NotFound(path)) => {
            print_error(&format!(
                "No wallet list at {}. Run 'frame-claim import' first.",
                path.display()
            ));
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to load wallet list"),
    };

    if wallets.is_empty() {
        print_warning("Wallet list is empty");
        return Ok(());
    }

    let width = wallets.iter().map(|w| w.name.len()).max().unwrap_or(0);
    for (i, wallet) in wallets.iter().enumerate() {
        let address = if full {
            wallet.address.to_string()
        } else {
            wallet.short_address()
        };
        println!("  {:>3}. {:<width$}   {}", i + 1, wallet.name, address, width = width);
    }

    Ok(())
}
