//! Claim command

use anyhow::{Context, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::info;

use crate::claimer::{Claimer, RunSummary};
use crate::client::{ClaimApi, FrameClient};
use crate::config::Config;
use crate::keystore::{Keystore, Signer};
use crate::report::{progress_bar, render};
use crate::wallet::{FileWalletStore, Wallet, WalletStore};

use super::{print_warning, prompt_password};

/// Run the claim command
pub async fn run(config: &Config) -> Result<()> {
    let passphrase = prompt_password("password: ")?;
    println!();

    // The key store is unlocked once and only read during the sweep.
    let mut keystore = Keystore::open(&config.keystore_dir, passphrase);
    let unlocked = keystore
        .unlock_all()
        .context("Failed to unlock key store")?;
    info!("Unlocked {} accounts", unlocked);

    let store = FileWalletStore::new(&config.wallets_file);
    let wallets = store.list().context("Failed to load wallet list")?;

    if wallets.is_empty() {
        print_warning(&format!(
            "No wallets in {}. Run 'frame-claim import' first.",
            store.path().display()
        ));
    }

    let client = FrameClient::new(&config.api_url, config.request_timeout())
        .context("Failed to create claim service client")?;

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = cancel.clone();
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let claimer = Claimer::new(keystore, client).with_cancel_flag(cancel);
    let (summary, table) = sweep(&claimer, &wallets).await;

    println!();
    print!("{}", table);

    if summary.cancelled {
        print_warning(&format!(
            "Cancelled after {} of {} wallets",
            summary.outcomes.len(),
            wallets.len()
        ));
    }

    Ok(())
}

/// Process `wallets` behind a progress bar and render the result table.
/// The table always ends with the `total:` line, even for an empty list.
pub async fn sweep<S: Signer, A: ClaimApi>(
    claimer: &Claimer<S, A>,
    wallets: &[Wallet],
) -> (RunSummary, String) {
    let bar = progress_bar(wallets.len() as u64);
    let summary = claimer.run(wallets, &bar).await;
    bar.finish();

    let table = render(&summary);
    (summary, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{
        ApiError, AuthenticateRequest, AuthenticateResponse, ClaimResponse, UserInfo,
    };
    use crate::error::SignError;
    use crate::report::HEADERS;
    use crate::wallet::Address;
    use async_trait::async_trait;

    struct NoKeys;

    impl Signer for NoKeys {
        fn sign(&self, address: &Address, _digest: &[u8; 32]) -> Result<[u8; 65], SignError> {
            Err(SignError::AccessDenied(*address))
        }
    }

    struct Offline;

    #[async_trait]
    impl ClaimApi for Offline {
        async fn authenticate(
            &self,
            _request: &AuthenticateRequest,
        ) -> Result<AuthenticateResponse, ApiError> {
            Err(ApiError::EmptyToken)
        }

        async fn claim(&self, _token: &str) -> Result<ClaimResponse, ApiError> {
            Err(ApiError::EmptyToken)
        }

        async fn user(&self, _token: &str) -> Result<UserInfo, ApiError> {
            Err(ApiError::EmptyToken)
        }
    }

    #[tokio::test]
    async fn test_empty_wallet_list_still_prints_total() {
        let claimer = Claimer::new(NoKeys, Offline);
        let (summary, table) = sweep(&claimer, &[]).await;

        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.total_allocation, 0);

        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with(HEADERS[0]));
        assert!(lines[0].ends_with(HEADERS[5]));
        assert_eq!(lines.last(), Some(&"total: 0"));
    }

    #[tokio::test]
    async fn test_sweep_renders_failed_wallets() {
        let claimer = Claimer::new(NoKeys, Offline);
        let wallets = vec![Wallet::new("locked", Address::new([0x01; 20]))];
        let (summary, table) = sweep(&claimer, &wallets).await;

        assert_eq!(summary.failed_count(), 1);
        assert!(table.contains("sign: access denied for"));
        assert!(table.ends_with("total: 0\n"));
    }
}
