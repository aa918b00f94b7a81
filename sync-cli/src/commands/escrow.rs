//! Escrow commands: confirm a release condition, release funds.

use anyhow::Result;
use sync_client::{ReleaseTransition, RemoteGateway, SyncClient};

use super::{format_amount, parse_transaction_id};

/// Run the confirm command.
pub async fn confirm<G: RemoteGateway + 'static>(
    client: &SyncClient<G>,
    transaction_id: &str,
    condition: &str,
) -> Result<()> {
    let id = parse_transaction_id(transaction_id)?;
    let record = client.assert_condition(&id, condition).await?;

    println!("Condition '{}' recorded for {}", condition, id);
    let remaining = record.pending_conditions();
    if remaining.is_empty() {
        println!("  All release conditions met.");
    } else {
        println!("  Still pending: {}", remaining.join(", "));
    }
    Ok(())
}

/// Run the release command.
pub async fn release<G: RemoteGateway + 'static>(
    client: &SyncClient<G>,
    transaction_id: &str,
    reason: &str,
) -> Result<ReleaseTransition> {
    let id = parse_transaction_id(transaction_id)?;
    let transition = client.release_escrow(&id, reason).await?;

    match transition {
        ReleaseTransition::Released => {
            if let Some(record) = client.escrow(&id).await? {
                println!(
                    "Released {} for {}",
                    format_amount(record.amount, &record.currency),
                    id
                );
            }
        }
        ReleaseTransition::AlreadyReleased => {
            println!("Escrow for {} was already released.", id);
        }
    }
    Ok(transition)
}
