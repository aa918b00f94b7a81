//! Queue a marketplace action.

use anyhow::{Context, Result};
use sync_client::{ActionId, ActionKind, ActionPayload, RemoteGateway, SyncClient};

/// Run the enqueue command.
pub async fn run<G: RemoteGateway + 'static>(
    client: &SyncClient<G>,
    kind: ActionKind,
    json: &str,
) -> Result<ActionId> {
    let body: serde_json::Value = serde_json::from_str(json).context("Payload is not valid JSON")?;
    let payload = ActionPayload::from_parts(kind, body)
        .with_context(|| format!("Payload does not match {}", kind))?;

    let id = client.enqueue(payload).await?;

    println!("Queued {} {}", kind, id);
    println!("  Pending: {}", client.pending().await.len());

    Ok(id)
}
