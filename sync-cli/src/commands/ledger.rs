//! Show transactions.

use anyhow::Result;
use sync_client::{RemoteGateway, SyncClient};

use super::{format_amount, format_timestamp};

/// Run the ledger command.
pub async fn run<G: RemoteGateway + 'static>(client: &SyncClient<G>) -> Result<()> {
    let transactions = client.transactions().await?;

    if transactions.is_empty() {
        println!("No transactions.");
        return Ok(());
    }

    for tx in &transactions {
        println!(
            "{}  {:<9} {:>16}  {:<12} escrow: {:<8} {}",
            tx.id,
            tx.status.as_str(),
            format_amount(tx.total, &tx.currency),
            tx.provider,
            tx.escrow_status.as_str(),
            format_timestamp(tx.created_at)
        );
        if let Some(reason) = &tx.failure_reason {
            println!("    declined: {}", reason);
        }
    }

    Ok(())
}
