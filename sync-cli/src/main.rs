//! # soko-sync
//!
//! Command-line client for the Soko-Sync offline action queue.
//!
//! ## Commands
//!
//! - `enqueue`: Queue a marketplace action
//! - `pay`: Price and queue a payment
//! - `list`: Show pending actions
//! - `sync`: Drain the queue through the gateway
//! - `confirm`: Mark an escrow release condition as met
//! - `release`: Release escrowed funds
//! - `ledger`: Show transactions
//! - `status`: Show queue and ledger counts
//!
//! ## Example
//!
//! ```bash
//! # Queue a message while offline
//! soko-sync enqueue MessageSend '{"conversation_id":"c-1","sender_id":"b-1","recipient_id":"f-1","body":"Hi"}'
//!
//! # Pay 50.00 KES through M-Pesa, held in escrow
//! soko-sync pay --provider mpesa --amount 5000 --phone +254712345678 --user b-1 --escrow
//!
//! # Back online
//! soko-sync sync
//!
//! # Buyer confirmed delivery
//! soko-sync release <transaction-id> --reason "delivered"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use sync_client::{ActionKind, HttpGateway, SyncClient};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{enqueue, escrow, ledger, list, pay, status, sync};

/// Command-line client for the Soko-Sync offline action queue.
#[derive(Parser, Debug)]
#[command(name = "soko-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the queue database and config
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/soko-sync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Never contact the gateway
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue a marketplace action
    Enqueue {
        /// Action kind (ListingCreate, ListingUpdate, MessageSend, PaymentSubmit, ProfileUpdate)
        kind: ActionKind,

        /// JSON body for the action
        json: String,
    },

    /// Price and queue a payment
    Pay {
        /// Provider id (e.g. mpesa, airtel_money, card)
        #[arg(long)]
        provider: String,

        /// Amount in minor units (cents)
        #[arg(long)]
        amount: u64,

        /// Phone number to charge
        #[arg(long)]
        phone: String,

        /// Paying user id
        #[arg(long)]
        user: String,

        /// Hold funds in escrow until released
        #[arg(long)]
        escrow: bool,
    },

    /// Show pending actions
    List,

    /// Drain the queue through the gateway
    Sync,

    /// Mark an escrow release condition as met
    Confirm {
        /// Transaction id
        transaction_id: String,

        /// Condition name (e.g. delivery_confirmed)
        condition: String,
    },

    /// Release escrowed funds
    Release {
        /// Transaction id
        transaction_id: String,

        /// Reason recorded with the release
        #[arg(long, short)]
        reason: String,
    },

    /// Show transactions, newest first
    Ledger,

    /// Show queue and ledger counts
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;
    tracing::debug!("Using data directory {}", data_dir.display());

    let config = config::load(&data_dir, cli.config.as_deref())?;
    let gateway = HttpGateway::new(&config.gateway.base_url, config.gateway.timeout())
        .context("Failed to create gateway client")?;
    let client = SyncClient::open(&config, gateway)
        .await
        .with_context(|| format!("Failed to open {}", config.storage.database.display()))?;

    match cli.command {
        Commands::Enqueue { kind, json } => {
            enqueue::run(&client, kind, &json).await?;
        }
        Commands::Pay {
            provider,
            amount,
            phone,
            user,
            escrow,
        } => {
            pay::run(&client, &provider, amount, &phone, &user, escrow).await?;
        }
        Commands::List => {
            list::run(&client).await?;
        }
        Commands::Sync => {
            sync::run(&client, cli.offline).await?;
        }
        Commands::Confirm {
            transaction_id,
            condition,
        } => {
            escrow::confirm(&client, &transaction_id, &condition).await?;
        }
        Commands::Release {
            transaction_id,
            reason,
        } => {
            escrow::release(&client, &transaction_id, &reason).await?;
        }
        Commands::Ledger => {
            ledger::run(&client).await?;
        }
        Commands::Status => {
            status::run(&client, &data_dir, cli.offline).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for soko-sync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("market", "soko", "soko-sync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
