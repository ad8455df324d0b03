use shared::order::{OrderStatus, Station};
use sqlx::SqliteExecutor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StationTicketRow {
    pub id: i64,
    pub order_id: i64,
    pub station: String,
    pub status: String,
    pub sequence: i64,
    pub created_at: i64,
}

/// Next ticket number for this order at this station
pub async fn next_sequence(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    station: Station,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(sequence), 0) + 1 FROM order_station_tickets
         WHERE order_id = ? AND station = ?",
    )
    .bind(order_id)
    .bind(station.as_str())
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

pub async fn create(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    station: Station,
    sequence: i64,
    now: i64,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO order_station_tickets (order_id, station, status, sequence, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(order_id)
    .bind(station.as_str())
    .bind(OrderStatus::Ordered.as_str())
    .bind(sequence)
    .bind(now)
    .fetch_one(db)
    .await?;
    Ok(row.0)
}

pub async fn list_for_order(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
) -> Result<Vec<StationTicketRow>, sqlx::Error> {
    sqlx::query_as::<_, StationTicketRow>(
        "SELECT id, order_id, station, status, sequence, created_at
         FROM order_station_tickets WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(db)
    .await
}

/// Items must be detached first (`order_items::detach_tickets`)
pub async fn delete_for_order(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM order_station_tickets WHERE order_id = ?")
        .bind(order_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
