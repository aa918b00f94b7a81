//! CLI command implementations.
//!
//! Commands take a ready [`SyncClient`] so tests can drive them with a
//! mock gateway.

pub mod enqueue;
pub mod escrow;
pub mod ledger;
pub mod list;
pub mod pay;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use std::str::FromStr;
use sync_client::TransactionId;

/// Parse a transaction id argument.
pub fn parse_transaction_id(s: &str) -> Result<TransactionId> {
    TransactionId::from_str(s).with_context(|| format!("Invalid transaction id: {}", s))
}

/// Format a minor-unit amount, e.g. `KES 50.75`.
pub fn format_amount(amount: u64, currency: &str) -> String {
    format!("{} {}.{:02}", currency, amount / 100, amount % 100)
}

/// Format a Unix-millis timestamp relative to now.
pub fn format_timestamp(ts_millis: u64) -> String {
    let diff = sync_client::now_millis().saturating_sub(ts_millis) / 1000;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
