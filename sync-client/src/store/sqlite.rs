//! SQLite storage backend for sync-client.

use super::{DeadLetter, LedgerStore, QueueStore};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use sync_core::{EscrowRecord, EscrowStatus, ReleaseCondition, Transaction, TransactionStatus};
use sync_types::{ActionId, ActionPayload, QueuedAction, TransactionId};

/// SQLite-backed durable store for the queue and the ledger.
///
/// Uses WAL mode so the CLI and a background drain can share a file.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(":memory:")?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A single connection that never idles out; dropping it drops the data.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        // seq is AUTOINCREMENT so a deleted row's position is never reused
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_actions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                action_id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dead_letters (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                action_id TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at INTEGER NOT NULL,
                attempts INTEGER NOT NULL,
                last_error TEXT,
                dead_lettered_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transactions (
                transaction_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                amount INTEGER NOT NULL,
                fee INTEGER NOT NULL,
                total INTEGER NOT NULL,
                currency TEXT NOT NULL,
                phone TEXT NOT NULL,
                status TEXT NOT NULL,
                escrow_enabled INTEGER NOT NULL,
                escrow_status TEXT NOT NULL,
                reference TEXT,
                failure_reason TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS escrow_records (
                transaction_id TEXT PRIMARY KEY REFERENCES transactions(transaction_id),
                amount INTEGER NOT NULL,
                currency TEXT NOT NULL,
                release_conditions TEXT NOT NULL,
                status TEXT NOT NULL,
                held_at INTEGER NOT NULL,
                released_at INTEGER,
                release_reason TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// SQLite integers are signed; amounts and times are stored as i64.
fn to_sql(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange(value))
}

fn from_sql(table: &'static str, value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt {
        table,
        reason: format!("negative value {}", value),
    })
}

#[derive(sqlx::FromRow)]
struct ActionRow {
    action_id: String,
    payload: String,
    enqueued_at: i64,
    attempts: i64,
    last_error: Option<String>,
}

impl ActionRow {
    fn into_action(self, table: &'static str) -> Result<QueuedAction, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt { table, reason };
        let id = ActionId::from_str(&self.action_id).map_err(|e| corrupt(e.to_string()))?;
        let payload = ActionPayload::from_json(&self.payload).map_err(|e| corrupt(e.to_string()))?;
        let attempts = u32::try_from(self.attempts)
            .map_err(|_| corrupt(format!("attempts {}", self.attempts)))?;
        Ok(QueuedAction {
            id,
            payload,
            enqueued_at: from_sql(table, self.enqueued_at)?,
            attempts,
            last_error: self.last_error,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeadLetterRow {
    #[sqlx(flatten)]
    action: ActionRow,
    dead_lettered_at: i64,
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    transaction_id: String,
    user_id: String,
    provider: String,
    amount: i64,
    fee: i64,
    total: i64,
    currency: String,
    phone: String,
    status: String,
    escrow_enabled: bool,
    escrow_status: String,
    reference: Option<String>,
    failure_reason: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "transactions";
        let corrupt = |reason: String| StoreError::Corrupt {
            table: TABLE,
            reason,
        };
        Ok(Transaction {
            id: TransactionId::from_str(&row.transaction_id).map_err(|e| corrupt(e.to_string()))?,
            user_id: row.user_id,
            provider: row.provider,
            amount: from_sql(TABLE, row.amount)?,
            fee: from_sql(TABLE, row.fee)?,
            total: from_sql(TABLE, row.total)?,
            currency: row.currency,
            phone: row.phone,
            status: TransactionStatus::parse(&row.status)
                .ok_or_else(|| corrupt(format!("status {}", row.status)))?,
            escrow_enabled: row.escrow_enabled,
            escrow_status: EscrowStatus::parse(&row.escrow_status)
                .ok_or_else(|| corrupt(format!("escrow_status {}", row.escrow_status)))?,
            reference: row.reference,
            failure_reason: row.failure_reason,
            created_at: from_sql(TABLE, row.created_at)?,
            updated_at: from_sql(TABLE, row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EscrowRow {
    transaction_id: String,
    amount: i64,
    currency: String,
    release_conditions: String,
    status: String,
    held_at: i64,
    released_at: Option<i64>,
    release_reason: Option<String>,
}

impl TryFrom<EscrowRow> for EscrowRecord {
    type Error = StoreError;

    fn try_from(row: EscrowRow) -> Result<Self, Self::Error> {
        const TABLE: &str = "escrow_records";
        let corrupt = |reason: String| StoreError::Corrupt {
            table: TABLE,
            reason,
        };
        let release_conditions: Vec<ReleaseCondition> =
            serde_json::from_str(&row.release_conditions).map_err(|e| corrupt(e.to_string()))?;
        Ok(EscrowRecord {
            transaction_id: TransactionId::from_str(&row.transaction_id)
                .map_err(|e| corrupt(e.to_string()))?,
            amount: from_sql(TABLE, row.amount)?,
            currency: row.currency,
            release_conditions,
            status: EscrowStatus::parse(&row.status)
                .ok_or_else(|| corrupt(format!("status {}", row.status)))?,
            held_at: from_sql(TABLE, row.held_at)?,
            released_at: row
                .released_at
                .map(|t| from_sql(TABLE, t))
                .transpose()?,
            release_reason: row.release_reason,
        })
    }
}

fn encode_payload(action: &QueuedAction) -> Result<String, StoreError> {
    action.payload.to_json().map_err(|e| StoreError::Corrupt {
        table: "pending_actions",
        reason: e.to_string(),
    })
}

fn encode_conditions(record: &EscrowRecord) -> Result<String, StoreError> {
    serde_json::to_string(&record.release_conditions).map_err(|e| StoreError::Corrupt {
        table: "escrow_records",
        reason: e.to_string(),
    })
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn load_pending(&self) -> Result<Vec<QueuedAction>, StoreError> {
        let rows: Vec<ActionRow> = sqlx::query_as(
            r#"
            SELECT action_id, payload, enqueued_at, attempts, last_error
            FROM pending_actions
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_action("pending_actions"))
            .collect()
    }

    async fn append(&self, action: &QueuedAction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pending_actions (action_id, kind, payload, enqueued_at, attempts, last_error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(action.id.to_string())
        .bind(action.kind().as_str())
        .bind(encode_payload(action)?)
        .bind(to_sql(action.enqueued_at)?)
        .bind(i64::from(action.attempts))
        .bind(action.last_error.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_failure(
        &self,
        id: &ActionId,
        attempts: u32,
        error: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE pending_actions SET attempts = ?1, last_error = ?2 WHERE action_id = ?3",
        )
        .bind(i64::from(attempts))
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                table: "pending_actions",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn remove(&self, id: &ActionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pending_actions WHERE action_id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn dead_letter(&self, action: &QueuedAction, now: u64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO dead_letters
                (action_id, kind, payload, enqueued_at, attempts, last_error, dead_lettered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(action.id.to_string())
        .bind(action.kind().as_str())
        .bind(encode_payload(action)?)
        .bind(to_sql(action.enqueued_at)?)
        .bind(i64::from(action.attempts))
        .bind(action.last_error.as_deref())
        .bind(to_sql(now)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_actions WHERE action_id = ?1")
            .bind(action.id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError> {
        let rows: Vec<DeadLetterRow> = sqlx::query_as(
            r#"
            SELECT action_id, payload, enqueued_at, attempts, last_error, dead_lettered_at
            FROM dead_letters
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DeadLetter {
                    dead_lettered_at: from_sql("dead_letters", row.dead_lettered_at)?,
                    action: row.action.into_action("dead_letters")?,
                })
            })
            .collect()
    }
}

const TRANSACTION_COLUMNS: &str = "transaction_id, user_id, provider, amount, fee, total, \
     currency, phone, status, escrow_enabled, escrow_status, reference, failure_reason, \
     created_at, updated_at";

const ESCROW_COLUMNS: &str = "transaction_id, amount, currency, release_conditions, status, \
     held_at, released_at, release_reason";

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                transaction_id, user_id, provider, amount, fee, total, currency, phone,
                status, escrow_enabled, escrow_status, reference, failure_reason,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(tx.id.to_string())
        .bind(&tx.user_id)
        .bind(&tx.provider)
        .bind(to_sql(tx.amount)?)
        .bind(to_sql(tx.fee)?)
        .bind(to_sql(tx.total)?)
        .bind(&tx.currency)
        .bind(&tx.phone)
        .bind(tx.status.as_str())
        .bind(tx.escrow_enabled)
        .bind(tx.escrow_status.as_str())
        .bind(tx.reference.as_deref())
        .bind(tx.failure_reason.as_deref())
        .bind(to_sql(tx.created_at)?)
        .bind(to_sql(tx.updated_at)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_transaction(
        &self,
        id: &TransactionId,
    ) -> Result<Option<Transaction>, StoreError> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions WHERE transaction_id = ?1",
            TRANSACTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM transactions ORDER BY created_at DESC, rowid DESC",
            TRANSACTION_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn record_settlement(
        &self,
        tx: &Transaction,
        escrow: Option<&EscrowRecord>,
    ) -> Result<(), StoreError> {
        let mut db = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET status = ?1, escrow_status = ?2, reference = ?3, failure_reason = ?4,
                updated_at = ?5
            WHERE transaction_id = ?6
            "#,
        )
        .bind(tx.status.as_str())
        .bind(tx.escrow_status.as_str())
        .bind(tx.reference.as_deref())
        .bind(tx.failure_reason.as_deref())
        .bind(to_sql(tx.updated_at)?)
        .bind(tx.id.to_string())
        .execute(&mut *db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                table: "transactions",
                id: tx.id.to_string(),
            });
        }

        if let Some(record) = escrow {
            // Primary key on transaction_id rejects a second hold.
            sqlx::query(&format!(
                "INSERT INTO escrow_records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                ESCROW_COLUMNS
            ))
            .bind(record.transaction_id.to_string())
            .bind(to_sql(record.amount)?)
            .bind(&record.currency)
            .bind(encode_conditions(record)?)
            .bind(record.status.as_str())
            .bind(to_sql(record.held_at)?)
            .bind(record.released_at.map(to_sql).transpose()?)
            .bind(record.release_reason.as_deref())
            .execute(&mut *db)
            .await?;
        }

        db.commit().await?;
        Ok(())
    }

    async fn get_escrow(&self, id: &TransactionId) -> Result<Option<EscrowRecord>, StoreError> {
        let row: Option<EscrowRow> = sqlx::query_as(&format!(
            "SELECT {} FROM escrow_records WHERE transaction_id = ?1",
            ESCROW_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(EscrowRecord::try_from).transpose()
    }

    async fn list_escrows(&self) -> Result<Vec<EscrowRecord>, StoreError> {
        let rows: Vec<EscrowRow> = sqlx::query_as(&format!(
            "SELECT {} FROM escrow_records ORDER BY held_at ASC, rowid ASC",
            ESCROW_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EscrowRecord::try_from).collect()
    }

    async fn update_escrow(&self, record: &EscrowRecord, now: u64) -> Result<(), StoreError> {
        let mut db = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE escrow_records
            SET release_conditions = ?1, status = ?2, released_at = ?3, release_reason = ?4
            WHERE transaction_id = ?5
            "#,
        )
        .bind(encode_conditions(record)?)
        .bind(record.status.as_str())
        .bind(record.released_at.map(to_sql).transpose()?)
        .bind(record.release_reason.as_deref())
        .bind(record.transaction_id.to_string())
        .execute(&mut *db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                table: "escrow_records",
                id: record.transaction_id.to_string(),
            });
        }

        sqlx::query(
            "UPDATE transactions SET escrow_status = ?1, updated_at = ?2 WHERE transaction_id = ?3",
        )
        .bind(record.status.as_str())
        .bind(to_sql(now)?)
        .bind(record.transaction_id.to_string())
        .execute(&mut *db)
        .await?;

        db.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::{AuthorizationOutcome, PaymentRequest, ProviderRegistry, Settlement};
    use sync_types::{OutgoingMessage, ProfilePatch};

    fn message(body: &str) -> QueuedAction {
        QueuedAction::new(ActionPayload::MessageSend(OutgoingMessage {
            conversation_id: "c-1".into(),
            sender_id: "buyer-1".into(),
            recipient_id: "seller-1".into(),
            body: body.into(),
        }))
    }

    fn profile() -> QueuedAction {
        QueuedAction::new(ActionPayload::ProfileUpdate(ProfilePatch {
            user_id: "farmer-1".into(),
            display_name: Some("Wanjiku".into()),
            phone: None,
            location: Some("Nakuru".into()),
            language: None,
        }))
    }

    fn pending_tx(amount: u64, escrow: bool, now: u64) -> Transaction {
        let registry = ProviderRegistry::new(sync_core::default_providers());
        PaymentRequest {
            user_id: "buyer-1".into(),
            provider: "mpesa".into(),
            amount,
            phone: "+254712345678".into(),
            escrow,
        }
        .price(&registry, now)
        .unwrap()
    }

    // ===========================================
    // Queue Tests
    // ===========================================

    #[tokio::test]
    async fn append_and_load_in_order() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = message("first");
        let b = profile();
        let c = message("third");
        store.append(&a).await.unwrap();
        store.append(&b).await.unwrap();
        store.append(&c).await.unwrap();

        let loaded = store.load_pending().await.unwrap();
        assert_eq!(loaded, vec![a, b, c]);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = message("hello");
        store.append(&a).await.unwrap();

        assert!(store.remove(&a.id).await.unwrap());
        assert!(!store.remove(&a.id).await.unwrap());
        assert!(store.load_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_append_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = message("hello");
        store.append(&a).await.unwrap();
        assert!(store.append(&a).await.is_err());
    }

    #[tokio::test]
    async fn record_failure_updates_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = message("hello");
        store.append(&a).await.unwrap();

        store.record_failure(&a.id, 2, "timeout").await.unwrap();

        let loaded = store.load_pending().await.unwrap();
        assert_eq!(loaded[0].attempts, 2);
        assert_eq!(loaded[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn record_failure_unknown_id() {
        let store = SqliteStore::in_memory().await.unwrap();
        let result = store.record_failure(&ActionId::new(), 1, "x").await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn dead_letter_moves_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = message("hello");
        let b = profile();
        store.append(&a).await.unwrap();
        store.append(&b).await.unwrap();

        store.dead_letter(&a, 42).await.unwrap();

        let pending = store.load_pending().await.unwrap();
        assert_eq!(pending, vec![b]);
        let parked = store.load_dead_letters().await.unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].action, a);
        assert_eq!(parked[0].dead_lettered_at, 42);
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let a = message("first");
        let b = message("second");

        {
            let store = SqliteStore::new(&path).await.unwrap();
            store.append(&a).await.unwrap();
            store.append(&b).await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteStore::new(&path).await.unwrap();
        assert_eq!(reopened.load_pending().await.unwrap(), vec![a, b]);
    }

    // ===========================================
    // Ledger Tests
    // ===========================================

    #[tokio::test]
    async fn transaction_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let tx = pending_tx(5_000, false, 1_000);
        store.insert_transaction(&tx).await.unwrap();

        let loaded = store.get_transaction(&tx.id).await.unwrap();
        assert_eq!(loaded, Some(tx));
    }

    #[tokio::test]
    async fn transactions_listed_newest_first() {
        let store = SqliteStore::in_memory().await.unwrap();
        let old = pending_tx(5_000, false, 1_000);
        let new = pending_tx(6_000, false, 2_000);
        store.insert_transaction(&old).await.unwrap();
        store.insert_transaction(&new).await.unwrap();

        let ids: Vec<_> = store
            .list_transactions()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn settlement_with_escrow_is_atomic() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut tx = pending_tx(5_000, true, 1_000);
        store.insert_transaction(&tx).await.unwrap();

        let settlement = tx
            .settle(&AuthorizationOutcome::approved(Some("MP123")), 2_000)
            .unwrap();
        let Settlement::Completed { escrow: Some(record) } = settlement else {
            panic!("expected escrow");
        };
        store.record_settlement(&tx, Some(&record)).await.unwrap();

        let stored_tx = store.get_transaction(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored_tx.status, TransactionStatus::Completed);
        assert_eq!(stored_tx.escrow_status, EscrowStatus::Held);
        let stored_escrow = store.get_escrow(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored_escrow, record);

        // A second hold for the same transaction is rejected and rolls back.
        assert!(store.record_settlement(&tx, Some(&record)).await.is_err());
        assert_eq!(store.list_escrows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_escrow_copies_status_to_transaction() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut tx = pending_tx(5_000, true, 1_000);
        store.insert_transaction(&tx).await.unwrap();
        let Settlement::Completed { escrow: Some(mut record) } = tx
            .settle(&AuthorizationOutcome::approved(None), 2_000)
            .unwrap()
        else {
            panic!("expected escrow");
        };
        store.record_settlement(&tx, Some(&record)).await.unwrap();

        record.release("delivered", 3_000);
        store.update_escrow(&record, 3_000).await.unwrap();

        let stored_tx = store.get_transaction(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored_tx.escrow_status, EscrowStatus::Released);
        assert_eq!(stored_tx.updated_at, 3_000);
        let stored = store.get_escrow(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.release_reason.as_deref(), Some("delivered"));
    }

    #[tokio::test]
    async fn condition_update_moves_timestamp_forward() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut tx = pending_tx(5_000, true, 1_000);
        store.insert_transaction(&tx).await.unwrap();
        let Settlement::Completed { escrow: Some(mut record) } = tx
            .settle(&AuthorizationOutcome::approved(None), 2_000)
            .unwrap()
        else {
            panic!("expected escrow");
        };
        store.record_settlement(&tx, Some(&record)).await.unwrap();

        record.assert_condition("delivery_confirmed", 4_000);
        store.update_escrow(&record, 4_000).await.unwrap();

        let stored_tx = store.get_transaction(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored_tx.escrow_status, EscrowStatus::Held);
        assert_eq!(stored_tx.updated_at, 4_000);
    }

    #[tokio::test]
    async fn amounts_beyond_i64_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut tx = pending_tx(5_000, false, 1_000);
        tx.total = u64::MAX;
        let result = store.insert_transaction(&tx).await;
        assert!(matches!(result, Err(StoreError::OutOfRange(v)) if v == u64::MAX));
    }
}
