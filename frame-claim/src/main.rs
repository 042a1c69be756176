//! Frame Airdrop Claimer CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frame_claim::{commands, config};

#[derive(Parser)]
#[command(name = "frame-claim")]
#[command(about = "Claim the Frame Chapter One airdrop for all local wallets")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (default: ~/.frame-claim/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate and claim for every wallet in the wallet list
    Claim,

    /// Import a private key and add it to the wallet list
    Import {
        /// Label for the wallet
        #[arg(short, long)]
        name: String,
    },

    /// Show the wallet list
    Wallets {
        /// Show full addresses
        #[arg(long)]
        full: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let config = config::Config::load_or_default(&config_path)?;

    match cli.command {
        Commands::Claim => commands::claim::run(&config).await,
        Commands::Import { name } => commands::import::run(&config, &config_path, &name).await,
        Commands::Wallets { full } => commands::wallets::run(&config, full).await,
    }
}
