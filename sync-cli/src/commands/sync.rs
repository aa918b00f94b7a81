//! Drain the queue through the gateway.

use anyhow::Result;
use sync_client::{
    Delivery, DrainOutcome, DrainReport, ItemResult, RemoteGateway, SyncClient, TransactionStatus,
};

/// Run the sync command.
///
/// With `offline`, nothing is sent; the pending queue is reported instead.
pub async fn run<G: RemoteGateway + 'static>(
    client: &SyncClient<G>,
    offline: bool,
) -> Result<Option<DrainReport>> {
    if offline {
        let pending = client.pending().await.len();
        println!("Offline: {} action(s) waiting for connectivity.", pending);
        return Ok(None);
    }

    match client.sync_now().await? {
        DrainOutcome::AlreadyDraining => {
            println!("A sync is already running.");
            Ok(None)
        }
        DrainOutcome::Completed(report) => {
            print_report(&report);
            Ok(Some(report))
        }
    }
}

fn print_report(report: &DrainReport) {
    for item in &report.items {
        let line = match &item.result {
            ItemResult::Delivered(Delivery::Receipt(receipt)) => match &receipt.remote_id {
                Some(id) => format!("delivered ({})", id),
                None => "delivered".to_string(),
            },
            ItemResult::Delivered(Delivery::Payment(tx)) => match tx.status {
                TransactionStatus::Failed => format!(
                    "payment declined: {}",
                    tx.failure_reason.as_deref().unwrap_or("no reason given")
                ),
                _ => format!("payment {} ({})", tx.status.as_str(), tx.escrow_status.as_str()),
            },
            ItemResult::Retained { attempts, error } => {
                format!("failed, will retry (attempt {}): {}", attempts, error)
            }
            ItemResult::DeadLettered { attempts, error } => {
                format!("gave up after {} attempts: {}", attempts, error)
            }
            ItemResult::Unresolved { error } => {
                format!("outcome not saved, will redeliver: {}", error)
            }
        };
        println!("  {} {:<14} {}", item.id, item.kind.as_str(), line);
    }

    println!();
    println!(
        "Sync complete: {} succeeded, {} failed",
        report.summary.succeeded, report.summary.failed
    );
}
