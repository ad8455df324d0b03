//! Order event store
//!
//! Append-only per-order log. `emit` allocates the next gapless sequence and
//! honours idempotency keys; `emit_guarded` additionally evaluates an
//! existence guard inside the same locked transaction, which is what makes
//! "emit paid once" safe under concurrent webhook deliveries.
//!
//! # Write path
//!
//! ```text
//! emit(new)
//!   ├─ key already recorded?            → return existing (no lock taken)
//!   ├─ OrderLocks::acquire(order_id)
//!   └─ BEGIN
//!        ├─ upsert order_event_heads    (first statement is a write → db lock)
//!        ├─ key recorded meanwhile?     → return existing
//!        ├─ guard rejects?              → Skipped
//!        ├─ last_sequence += 1
//!        └─ INSERT … ON CONFLICT DO NOTHING RETURNING …
//!   COMMIT
//! ```

use serde_json::Value;
use shared::now_millis;
use shared::order::{EntityType, EventPayload, EventSource, OrderEvent, OrderEventType};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use std::convert::Infallible;
use tracing::{debug, info, warn};

use super::error::{StoreError, StoreResult};
use super::locks::OrderLocks;
use crate::db::split_payments;

/// Attempts before giving up on a contended sequence
const MAX_SEQUENCE_ATTEMPTS: u32 = 3;

const EVENT_COLUMNS: &str = "id, order_id, sequence, event_type, entity_type, entity_id, source, \
     idempotency_key, payload, occurred_at, created_at";

/// Event to be appended
#[derive(Debug, Clone)]
pub struct NewOrderEvent {
    pub order_id: i64,
    pub payload: EventPayload,
    pub entity_type: EntityType,
    pub entity_id: Option<String>,
    pub source: EventSource,
    pub idempotency_key: Option<String>,
    /// Defaults to the time of the append
    pub occurred_at: Option<i64>,
}

impl NewOrderEvent {
    /// Order-level event from the system, no idempotency key
    pub fn new(order_id: i64, payload: EventPayload) -> Self {
        Self {
            order_id,
            payload,
            entity_type: EntityType::Order,
            entity_id: Some(order_id.to_string()),
            source: EventSource::System,
            idempotency_key: None,
            occurred_at: None,
        }
    }

    pub fn entity(mut self, entity_type: EntityType, entity_id: Option<String>) -> Self {
        self.entity_type = entity_type;
        self.entity_id = entity_id;
        self
    }

    pub fn source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn occurred_at(mut self, occurred_at: i64) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }
}

/// Existence checks evaluated under the order lock before appending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitGuard {
    /// Skip if the order already has an event of this type
    FirstOfType,
    /// Skip if an event of this type exists, or none of the given type does
    FirstOfTypeAfter(OrderEventType),
    /// Skip if an event of this type exists, or a split payment is unsettled
    FirstOfTypeWhenSettled,
}

/// Result of an append
#[derive(Debug, Clone, PartialEq)]
pub enum EmitOutcome {
    /// New event written
    Appended(OrderEvent),
    /// Idempotency key already recorded; the canonical event
    Existing(OrderEvent),
    /// Guard rejected the append
    Skipped,
}

/// Unguarded appends carry `Infallible` as their guard type
impl From<Infallible> for EmitGuard {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// What the locked append path wrote or found
enum Stored {
    Appended(OrderEvent),
    Existing(OrderEvent),
}

impl Stored {
    fn into_event(self) -> OrderEvent {
        match self {
            Stored::Appended(e) | Stored::Existing(e) => e,
        }
    }

    fn into_outcome(self) -> EmitOutcome {
        match self {
            Stored::Appended(e) => EmitOutcome::Appended(e),
            Stored::Existing(e) => EmitOutcome::Existing(e),
        }
    }
}

impl EmitOutcome {
    pub fn event(&self) -> Option<&OrderEvent> {
        match self {
            EmitOutcome::Appended(e) | EmitOutcome::Existing(e) => Some(e),
            EmitOutcome::Skipped => None,
        }
    }

    pub fn is_appended(&self) -> bool {
        matches!(self, EmitOutcome::Appended(_))
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: i64,
    order_id: i64,
    sequence: i64,
    event_type: String,
    entity_type: String,
    entity_id: Option<String>,
    source: String,
    idempotency_key: Option<String>,
    payload: String,
    occurred_at: i64,
    created_at: i64,
}

impl TryFrom<EventRow> for OrderEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let raw: Value = serde_json::from_str(&row.payload).unwrap_or(Value::String(row.payload));
        let payload = EventPayload::decode(&row.event_type, raw);
        if payload.is_unknown() && row.event_type.parse::<OrderEventType>().is_ok() {
            warn!(
                order_id = row.order_id,
                sequence = row.sequence,
                event_type = %row.event_type,
                "Malformed event payload, treating as unknown"
            );
        }

        Ok(OrderEvent {
            id: row.id,
            order_id: row.order_id,
            sequence: row.sequence,
            event_type: row.event_type,
            entity_type: row.entity_type.parse()?,
            entity_id: row.entity_id,
            source: row.source.parse()?,
            idempotency_key: row.idempotency_key,
            payload,
            occurred_at: row.occurred_at,
            created_at: row.created_at,
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> StoreResult<Vec<OrderEvent>> {
    rows.into_iter().map(OrderEvent::try_from).collect()
}

// ========== Queries usable on the pool or inside a transaction ==========

/// Events with sequence greater than `cursor`, ascending
pub(crate) async fn fetch_after(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    cursor: i64,
) -> StoreResult<Vec<OrderEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM order_events
         WHERE order_id = ? AND sequence > ?
         ORDER BY sequence"
    );
    let rows = sqlx::query_as::<_, EventRow>(&sql)
        .bind(order_id)
        .bind(cursor)
        .fetch_all(db)
        .await?;
    into_events(rows)
}

pub(crate) async fn has_events_after(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    cursor: i64,
) -> StoreResult<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM order_events WHERE order_id = ? AND sequence > ?)",
    )
    .bind(order_id)
    .bind(cursor)
    .fetch_one(db)
    .await?;
    Ok(row.0 != 0)
}

async fn fetch_by_key(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    key: &str,
) -> StoreResult<Option<OrderEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM order_events WHERE order_id = ? AND idempotency_key = ?"
    );
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(order_id)
        .bind(key)
        .fetch_optional(db)
        .await?;
    row.map(OrderEvent::try_from).transpose()
}

async fn type_exists(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    event_type: &str,
) -> StoreResult<bool> {
    let row: (i64,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM order_events WHERE order_id = ? AND event_type = ?)",
    )
    .bind(order_id)
    .bind(event_type)
    .fetch_one(db)
    .await?;
    Ok(row.0 != 0)
}

/// Write the order's head row; fails with `OrderNotFound` for unknown orders.
async fn lock_head(conn: &mut SqliteConnection, order_id: i64, now: i64) -> StoreResult<()> {
    let result = sqlx::query(
        "INSERT INTO order_event_heads (order_id, last_sequence, updated_at)
         SELECT id, 0, ? FROM orders WHERE id = ?
         ON CONFLICT (order_id) DO UPDATE SET updated_at = excluded.updated_at",
    )
    .bind(now)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::OrderNotFound(order_id));
    }
    Ok(())
}

async fn allocate_sequence(conn: &mut SqliteConnection, order_id: i64) -> StoreResult<i64> {
    let row: (i64,) = sqlx::query_as(
        "UPDATE order_event_heads SET last_sequence = last_sequence + 1
         WHERE order_id = ?
         RETURNING last_sequence",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.0)
}

/// Re-align the head with the log after a lost sequence race
async fn resync_head(conn: &mut SqliteConnection, order_id: i64) -> StoreResult<()> {
    sqlx::query(
        "UPDATE order_event_heads
         SET last_sequence = (SELECT COALESCE(MAX(sequence), 0) FROM order_events WHERE order_id = ?)
         WHERE order_id = ?",
    )
    .bind(order_id)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn guard_permits(
    conn: &mut SqliteConnection,
    order_id: i64,
    event_type: &str,
    guard: EmitGuard,
) -> StoreResult<bool> {
    if type_exists(&mut *conn, order_id, event_type).await? {
        return Ok(false);
    }
    match guard {
        EmitGuard::FirstOfType => Ok(true),
        EmitGuard::FirstOfTypeAfter(required) => {
            type_exists(&mut *conn, order_id, required.as_str()).await
        }
        EmitGuard::FirstOfTypeWhenSettled => {
            Ok(split_payments::all_succeeded(&mut *conn, order_id).await?)
        }
    }
}

// ========== EventStore ==========

#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
    locks: OrderLocks,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl EventStore {
    pub fn new(pool: SqlitePool, locks: OrderLocks) -> Self {
        Self { pool, locks }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append an event and return it; with an idempotency key already
    /// recorded for the order, return the existing event instead.
    pub async fn emit(&self, new: NewOrderEvent) -> StoreResult<OrderEvent> {
        let Ok(stored) = self.append(new, None::<Infallible>).await?;
        Ok(stored.into_event())
    }

    /// Append only if `guard` holds at the moment the sequence is allocated
    pub async fn emit_guarded(
        &self,
        new: NewOrderEvent,
        guard: EmitGuard,
    ) -> StoreResult<EmitOutcome> {
        Ok(match self.append(new, Some(guard)).await? {
            Ok(stored) => stored.into_outcome(),
            Err(_rejected) => EmitOutcome::Skipped,
        })
    }

    /// Locked append; a guard that rejects comes back as `Err(guard)`
    async fn append<G>(
        &self,
        new: NewOrderEvent,
        guard: Option<G>,
    ) -> StoreResult<Result<Stored, G>>
    where
        G: Copy + Into<EmitGuard>,
    {
        let order_id = new.order_id;

        // 幂等快速路径：无需加锁
        if let Some(key) = &new.idempotency_key
            && let Some(existing) = fetch_by_key(&self.pool, order_id, key).await?
        {
            debug!(order_id, key = %key, sequence = existing.sequence, "Idempotent emit hit");
            return Ok(Ok(Stored::Existing(existing)));
        }

        let event_type = new.payload.event_type().to_string();
        let payload = serde_json::to_string(&new.payload)?;
        let _guard = self.locks.acquire(order_id).await;

        for attempt in 1..=MAX_SEQUENCE_ATTEMPTS {
            let now = now_millis();
            let mut tx = self.pool.begin().await?;
            lock_head(&mut tx, order_id, now).await?;

            if let Some(key) = &new.idempotency_key
                && let Some(existing) = fetch_by_key(&mut *tx, order_id, key).await?
            {
                return Ok(Ok(Stored::Existing(existing)));
            }

            if let Some(guard) = guard {
                let check: EmitGuard = guard.into();
                if !guard_permits(&mut tx, order_id, &event_type, check).await? {
                    debug!(order_id, event_type = %event_type, guard = ?check, "Emit guard rejected append");
                    return Ok(Err(guard));
                }
            }

            let sequence = allocate_sequence(&mut tx, order_id).await?;
            let sql = format!(
                "INSERT INTO order_events
                    (order_id, sequence, event_type, entity_type, entity_id, source,
                     idempotency_key, payload, occurred_at, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT DO NOTHING
                 RETURNING {EVENT_COLUMNS}"
            );
            let inserted = sqlx::query_as::<_, EventRow>(&sql)
                .bind(order_id)
                .bind(sequence)
                .bind(&event_type)
                .bind(new.entity_type.as_str())
                .bind(new.entity_id.as_deref())
                .bind(new.source.as_str())
                .bind(new.idempotency_key.as_deref())
                .bind(&payload)
                .bind(new.occurred_at.unwrap_or(now))
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?;

            match inserted {
                Some(row) => {
                    tx.commit().await?;
                    let event = OrderEvent::try_from(row)?;
                    info!(
                        order_id,
                        sequence = event.sequence,
                        event_type = %event.event_type,
                        source = %event.source,
                        "Order event appended"
                    );
                    return Ok(Ok(Stored::Appended(event)));
                }
                None => {
                    // Conflict: either the key landed concurrently, or the head lagged the log
                    if let Some(key) = &new.idempotency_key
                        && let Some(existing) = fetch_by_key(&mut *tx, order_id, key).await?
                    {
                        return Ok(Ok(Stored::Existing(existing)));
                    }
                    warn!(order_id, sequence, attempt, "Sequence already taken, retrying");
                    resync_head(&mut tx, order_id).await?;
                    tx.commit().await?;
                }
            }
        }

        Err(StoreError::SequenceContention {
            order_id,
            attempts: MAX_SEQUENCE_ATTEMPTS,
        })
    }

    /// Full log of an order, ascending by sequence
    pub async fn events_for(&self, order_id: i64) -> StoreResult<Vec<OrderEvent>> {
        fetch_after(&self.pool, order_id, 0).await
    }

    pub async fn events_after(&self, order_id: i64, cursor: i64) -> StoreResult<Vec<OrderEvent>> {
        fetch_after(&self.pool, order_id, cursor).await
    }

    pub async fn has_event(&self, order_id: i64, event_type: OrderEventType) -> StoreResult<bool> {
        type_exists(&self.pool, order_id, event_type.as_str()).await
    }

    pub async fn count_events(&self, order_id: i64, event_type: &str) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM order_events WHERE order_id = ? AND event_type = ?",
        )
        .bind(order_id)
        .bind(event_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn find_by_idempotency_key(
        &self,
        order_id: i64,
        key: &str,
    ) -> StoreResult<Option<OrderEvent>> {
        fetch_by_key(&self.pool, order_id, key).await
    }
}
