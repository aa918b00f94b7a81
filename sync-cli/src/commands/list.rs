//! Show pending actions.

use anyhow::Result;
use sync_client::{RemoteGateway, SyncClient};

use super::format_timestamp;

/// Run the list command.
pub async fn run<G: RemoteGateway + 'static>(client: &SyncClient<G>) -> Result<()> {
    let pending = client.pending().await;

    if pending.is_empty() {
        println!("No pending actions.");
    } else {
        println!("{} pending action(s), oldest first:", pending.len());
        for (i, action) in pending.iter().enumerate() {
            println!(
                "  {:>3}. {} {:<14} queued {}, attempts {}",
                i + 1,
                action.id,
                action.kind().as_str(),
                format_timestamp(action.enqueued_at),
                action.attempts
            );
            if let Some(error) = &action.last_error {
                println!("       last error: {}", error);
            }
        }
    }

    let parked = client.dead_letters().await?;
    if !parked.is_empty() {
        println!();
        println!("{} dead-lettered action(s):", parked.len());
        for letter in &parked {
            println!(
                "  {} {} after {} attempts: {}",
                letter.action.id,
                letter.action.kind(),
                letter.action.attempts,
                letter.action.last_error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use sync_client::{ActionPayload, ProfilePatch};

    #[tokio::test]
    async fn list_empty_queue() {
        let client = testing::client().await;
        assert!(run(&client).await.is_ok());
    }

    #[tokio::test]
    async fn list_with_failures() {
        let client = testing::client().await;
        client
            .enqueue(ActionPayload::ProfileUpdate(ProfilePatch {
                user_id: "f-1".into(),
                display_name: Some("Otieno".into()),
                phone: None,
                location: None,
                language: None,
            }))
            .await
            .unwrap();
        client.gateway().set_offline(true);
        client.sync_now().await.unwrap();

        assert!(run(&client).await.is_ok());
        assert_eq!(client.pending().await[0].attempts, 1);
    }
}
