//! Persisted webhook jobs (pending queue + dead letters)

use shared::payment::ProviderEvent;
use sqlx::SqliteExecutor;

/// Waiting for (another) ingestion attempt
pub const STATUS_PENDING: &str = "pending";
/// Gave up after too many attempts; recovered on the next worker start
pub const STATUS_DEAD: &str = "dead";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookJobRow {
    pub id: i64,
    pub provider: String,
    pub provider_event_id: String,
    pub event: String,
    pub status: String,
    pub retry_count: i64,
    pub ledger_committed: bool,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl WebhookJobRow {
    pub fn event(&self) -> Result<ProviderEvent, serde_json::Error> {
        serde_json::from_str(&self.event)
    }
}

const COLUMNS: &str = "id, provider, provider_event_id, event, status, retry_count, \
     ledger_committed, last_error, created_at, updated_at";

/// Persist a delivery and return its job id.
///
/// A redelivery of an event still queued reuses the row; a dead one is
/// revived with a fresh retry budget.
pub async fn insert_pending(
    db: impl SqliteExecutor<'_>,
    event: &ProviderEvent,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let json = serde_json::to_string(event).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO webhook_jobs (provider, provider_event_id, event, status, created_at, updated_at)
         VALUES (?, ?, ?, 'pending', ?, ?)
         ON CONFLICT (provider, provider_event_id) DO UPDATE SET
            retry_count = CASE WHEN status = 'dead' THEN 0 ELSE retry_count END,
            status = 'pending',
            updated_at = excluded.updated_at
         RETURNING id",
    )
    .bind(event.provider.as_str())
    .bind(&event.provider_event_id)
    .bind(json)
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

pub async fn find(db: impl SqliteExecutor<'_>, id: i64) -> Result<Option<WebhookJobRow>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM webhook_jobs WHERE id = ?");
    sqlx::query_as::<_, WebhookJobRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Pending jobs, oldest first
pub async fn list_pending(db: impl SqliteExecutor<'_>) -> Result<Vec<WebhookJobRow>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM webhook_jobs WHERE status = ? ORDER BY id");
    sqlx::query_as::<_, WebhookJobRow>(&sql)
        .bind(STATUS_PENDING)
        .fetch_all(db)
        .await
}

pub async fn count_by_status(db: impl SqliteExecutor<'_>, status: &str) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM webhook_jobs WHERE status = ?")
        .bind(status)
        .fetch_one(db)
        .await?;
    Ok(row.0)
}

/// Ingestion succeeded
pub async fn complete(db: impl SqliteExecutor<'_>, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM webhook_jobs WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Record a failed attempt; returns the new retry count (0 if the row is gone)
pub async fn mark_failed(
    db: impl SqliteExecutor<'_>,
    id: i64,
    error: &str,
    ledger_committed: bool,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "UPDATE webhook_jobs SET
            retry_count = retry_count + 1,
            ledger_committed = MAX(ledger_committed, ?),
            last_error = ?,
            updated_at = ?
         WHERE id = ?
         RETURNING retry_count",
    )
    .bind(ledger_committed)
    .bind(error)
    .bind(now)
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row.map_or(0, |r| r.0))
}

pub async fn move_to_dead_letter(db: impl SqliteExecutor<'_>, id: i64, now: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE webhook_jobs SET status = ?, updated_at = ? WHERE id = ?")
        .bind(STATUS_DEAD)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Move every dead job back to pending with a reset retry count
pub async fn recover_dead_letters(db: impl SqliteExecutor<'_>, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE webhook_jobs SET status = ?, retry_count = 0, updated_at = ? WHERE status = ?",
    )
    .bind(STATUS_PENDING)
    .bind(now)
    .bind(STATUS_DEAD)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}
