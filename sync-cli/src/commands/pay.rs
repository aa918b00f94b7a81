//! Price and queue a payment.

use anyhow::Result;
use sync_client::{PaymentRequest, RemoteGateway, SubmittedPayment, SyncClient};

use super::format_amount;

/// Run the pay command.
pub async fn run<G: RemoteGateway + 'static>(
    client: &SyncClient<G>,
    provider: &str,
    amount: u64,
    phone: &str,
    user: &str,
    escrow: bool,
) -> Result<SubmittedPayment> {
    let request = PaymentRequest {
        user_id: user.to_string(),
        provider: provider.to_string(),
        amount,
        phone: phone.to_string(),
        escrow,
    };

    let submitted = client.submit_payment(&request).await?;
    let tx = &submitted.transaction;

    println!("Payment queued");
    println!("  Transaction: {}", tx.id);
    println!("  Provider:    {}", tx.provider);
    println!("  Amount:      {}", format_amount(tx.amount, &tx.currency));
    println!("  Fee:         {}", format_amount(tx.fee, &tx.currency));
    println!("  Total:       {}", format_amount(tx.total, &tx.currency));
    println!("  Escrow:      {}", if tx.escrow_enabled { "yes" } else { "no" });
    println!();
    println!("Run 'soko-sync sync' when online to authorize.");

    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use sync_client::{ClientError, PaymentError, TransactionStatus};

    #[tokio::test]
    async fn pay_queues_priced_transaction() {
        let client = testing::client().await;

        let submitted = run(&client, "mpesa", 5_000, "+254712345678", "b-1", true)
            .await
            .unwrap();

        assert_eq!(submitted.transaction.fee, 75);
        assert_eq!(submitted.transaction.total, 5_075);
        assert_eq!(submitted.transaction.status, TransactionStatus::Pending);
        assert_eq!(client.pending().await.len(), 1);
        assert_eq!(client.transactions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pay_below_minimum_fails() {
        let client = testing::client().await;

        let err = run(&client, "mpesa", 999, "+254712345678", "b-1", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Payment(PaymentError::AmountOutOfRange { .. }))
        ));
        assert!(client.pending().await.is_empty());
    }
}
