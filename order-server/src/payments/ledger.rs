//! Payment ledger
//!
//! Immutable log of provider events, unique on `(provider, provider_event_id)`.
//! A second append of the same provider event is not an error: the caller
//! gets [`AppendOutcome::Duplicate`] with the row stored first.

use serde::Serialize;
use serde_json::Value;
use shared::payment::{LedgerEntityType, LedgerEventType, PaymentProvider};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

use super::error::{LedgerError, LedgerResult};

const LEDGER_COLUMNS: &str = "id, provider, provider_event_id, provider_event_type, occurred_at, \
     entity_type, entity_id, event_type, amount_cents, currency, metadata, raw_event_payload, created_at";

#[derive(Debug, Clone)]
pub struct NewLedgerEvent {
    pub provider: PaymentProvider,
    pub provider_event_id: String,
    pub provider_event_type: String,
    pub occurred_at: i64,
    pub entity_type: LedgerEntityType,
    pub entity_id: Option<i64>,
    pub event_type: LedgerEventType,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub metadata: Value,
    pub raw_event_payload: Value,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEvent {
    pub id: i64,
    pub provider: PaymentProvider,
    pub provider_event_id: String,
    pub provider_event_type: String,
    pub occurred_at: i64,
    pub entity_type: LedgerEntityType,
    pub entity_id: Option<i64>,
    pub event_type: LedgerEventType,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub metadata: Value,
    pub raw_event_payload: Value,
    pub created_at: i64,
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    provider: String,
    provider_event_id: String,
    provider_event_type: String,
    occurred_at: i64,
    entity_type: String,
    entity_id: Option<i64>,
    event_type: String,
    amount_cents: Option<i64>,
    currency: Option<String>,
    metadata: String,
    raw_event_payload: String,
    created_at: i64,
}

impl TryFrom<LedgerRow> for LedgerEvent {
    type Error = LedgerError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            provider: row.provider.parse()?,
            provider_event_id: row.provider_event_id,
            provider_event_type: row.provider_event_type,
            occurred_at: row.occurred_at,
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            event_type: row.event_type.parse()?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            metadata: serde_json::from_str(&row.metadata)?,
            raw_event_payload: serde_json::from_str(&row.raw_event_payload)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Inserted(LedgerEvent),
    /// Provider event already recorded; the stored row
    Duplicate(LedgerEvent),
}

impl AppendOutcome {
    pub fn event(&self) -> &LedgerEvent {
        match self {
            AppendOutcome::Inserted(e) | AppendOutcome::Duplicate(e) => e,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppendOutcome::Duplicate(_))
    }
}

/// Insert-or-fetch on one connection, plain or inside a transaction
pub async fn append(
    db: &mut SqliteConnection,
    new: &NewLedgerEvent,
) -> LedgerResult<AppendOutcome> {
    let metadata = serde_json::to_string(&new.metadata)?;
    let raw = serde_json::to_string(&new.raw_event_payload)?;
    let sql = format!(
        "INSERT INTO ledger_events
            (provider, provider_event_id, provider_event_type, occurred_at, entity_type,
             entity_id, event_type, amount_cents, currency, metadata, raw_event_payload, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (provider, provider_event_id) DO NOTHING
         RETURNING {LEDGER_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, LedgerRow>(&sql)
        .bind(new.provider.as_str())
        .bind(&new.provider_event_id)
        .bind(&new.provider_event_type)
        .bind(new.occurred_at)
        .bind(new.entity_type.as_str())
        .bind(new.entity_id)
        .bind(new.event_type.as_str())
        .bind(new.amount_cents)
        .bind(new.currency.as_deref())
        .bind(metadata)
        .bind(raw)
        .bind(new.created_at)
        .fetch_optional(&mut *db)
        .await?;

    if let Some(row) = inserted {
        return Ok(AppendOutcome::Inserted(row.try_into()?));
    }

    let existing = find(&mut *db, new.provider, &new.provider_event_id)
        .await?
        .ok_or_else(|| LedgerError::Vanished {
            provider: new.provider.to_string(),
            provider_event_id: new.provider_event_id.clone(),
        })?;
    Ok(AppendOutcome::Duplicate(existing))
}

pub async fn find(
    db: impl SqliteExecutor<'_>,
    provider: PaymentProvider,
    provider_event_id: &str,
) -> LedgerResult<Option<LedgerEvent>> {
    let sql = format!(
        "SELECT {LEDGER_COLUMNS} FROM ledger_events WHERE provider = ? AND provider_event_id = ?"
    );
    sqlx::query_as::<_, LedgerRow>(&sql)
        .bind(provider.as_str())
        .bind(provider_event_id)
        .fetch_optional(db)
        .await?
        .map(LedgerEvent::try_from)
        .transpose()
}

/// Pool-backed handle for reads and standalone appends
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, new: &NewLedgerEvent) -> LedgerResult<AppendOutcome> {
        let mut conn = self.pool.acquire().await?;
        append(&mut *conn, new).await
    }

    pub async fn find(
        &self,
        provider: PaymentProvider,
        provider_event_id: &str,
    ) -> LedgerResult<Option<LedgerEvent>> {
        find(&self.pool, provider, provider_event_id).await
    }

    pub async fn count(&self) -> LedgerResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ledger_events")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Rows recorded against one attempt or refund, oldest first
    pub async fn list_for_entity(
        &self,
        entity_type: LedgerEntityType,
        entity_id: i64,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM ledger_events
             WHERE entity_type = ? AND entity_id = ? ORDER BY id"
        );
        sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(entity_type.as_str())
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(LedgerEvent::try_from)
            .collect()
    }
}
