//! CLI Commands
//!
//! Implementation of all frame-claim CLI commands.

pub mod claim;
pub mod import;
pub mod wallets;

use anyhow::{anyhow, Result};
use std::io::{self, Write};
use zeroize::Zeroizing;

/// Prompt for hidden input
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = rpassword::read_password()?;
    Ok(Zeroizing::new(password))
}

/// Prompt for a new passphrase with confirmation
pub fn prompt_new_password() -> Result<Zeroizing<String>> {
    let password = prompt_password("Enter key store passphrase: ")?;
    if password.is_empty() {
        return Err(anyhow!("Passphrase must not be empty"));
    }

    let confirm = prompt_password("Confirm passphrase: ")?;
    if *password != *confirm {
        return Err(anyhow!("Passphrases do not match"));
    }

    Ok(password)
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("\x1b[31mError:\x1b[0m {}", message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\x1b[32m{}\x1b[0m", message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("\x1b[33mWarning:\x1b[0m {}", message);
}
