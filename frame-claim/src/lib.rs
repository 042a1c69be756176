//! Frame Airdrop Claimer
//!
//! Claims the Frame Chapter One airdrop for every wallet in a local key
//! store. Each wallet proves ownership of its address by signing a challenge
//! message, then claims its allocation if it has one and has not claimed
//! yet.
//!
//! ## Flow
//!
//! - Wallets are processed one at a time, in wallet-list order
//! - Private keys never leave the key store; only signatures are sent
//! - A failing wallet never stops the run, it becomes an error row

pub mod claimer;
pub mod client;
pub mod config;
pub mod error;
pub mod keystore;
pub mod report;
pub mod signing;
pub mod wallet;

pub mod commands;

pub use claimer::{ClaimOutcome, Claimer, RunSummary, Stage};
pub use client::{ClaimApi, FrameClient};
pub use keystore::{Keystore, Signer};
pub use wallet::{Address, FileWalletStore, Wallet, WalletStore};
