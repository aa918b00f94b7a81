//! Show queue and ledger status.

use anyhow::Result;
use std::path::Path;
use sync_client::{Reachability, RemoteGateway, SyncClient};

/// Run the status command.
pub async fn run<G: RemoteGateway + 'static>(
    client: &SyncClient<G>,
    data_dir: &Path,
    offline: bool,
) -> Result<()> {
    let status = client.status().await?;

    println!("=== soko-sync status ===");
    println!();
    println!("Data dir: {}", data_dir.display());
    println!();
    println!("Queue:");
    println!("  Pending:       {}", status.pending);
    println!("  Dead-lettered: {}", status.dead_letters);
    println!();
    println!("Ledger:");
    println!("  Transactions:  {}", status.transactions);
    println!("  Escrow held:   {}", status.escrow_held);
    println!();

    let connection = match (offline, status.reachability) {
        (true, _) => "OFFLINE (--offline)",
        (false, Reachability::Online) => "ONLINE",
        (false, Reachability::Offline) => "OFFLINE",
        (false, Reachability::Unknown) => "UNKNOWN (run 'soko-sync sync' to try the gateway)",
    };
    println!("Connection: {}", connection);

    Ok(())
}
