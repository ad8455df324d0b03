use shared::order::{ItemStatus, OrderStatus};
use sqlx::SqliteExecutor;

/// Order line joined with its menu item's station
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub line_key: String,
    pub menu_item_id: i64,
    pub qty: i64,
    pub status: String,
    pub price: f64,
    pub station_ticket_id: Option<i64>,
    pub station: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct CreateOrderItem<'a> {
    pub order_id: i64,
    pub line_key: &'a str,
    pub menu_item_id: i64,
    pub qty: i64,
    pub price: f64,
    pub status: ItemStatus,
    pub now: i64,
}

/// Insert a line unless the order already has one with this line key.
/// Returns true when a row was written.
pub async fn insert_if_absent(
    db: impl SqliteExecutor<'_>,
    item: &CreateOrderItem<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO order_items (order_id, line_key, menu_item_id, qty, status, price, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (order_id, line_key) DO NOTHING",
    )
    .bind(item.order_id)
    .bind(item.line_key)
    .bind(item.menu_item_id)
    .bind(item.qty)
    .bind(item.status.as_str())
    .bind(item.price)
    .bind(item.now)
    .bind(item.now)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn line_exists(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    line_key: &str,
) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM order_items WHERE order_id = ? AND line_key = ?)",
    )
    .bind(order_id)
    .bind(line_key)
    .fetch_one(db)
    .await?;
    Ok(row.0 != 0)
}

pub async fn list_for_order(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
) -> Result<Vec<OrderItemRow>, sqlx::Error> {
    sqlx::query_as::<_, OrderItemRow>(
        "SELECT oi.id, oi.order_id, oi.line_key, oi.menu_item_id, oi.qty, oi.status, oi.price,
                oi.station_ticket_id, mi.station, oi.created_at, oi.updated_at
         FROM order_items oi
         LEFT JOIN menu_items mi ON mi.id = oi.menu_item_id
         WHERE oi.order_id = ?
         ORDER BY oi.id",
    )
    .bind(order_id)
    .fetch_all(db)
    .await
}

/// Removed lines keep their row but stop counting towards the bill
pub async fn mark_removed_by_line_key(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    line_key: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE order_items SET status = ?, price = 0, updated_at = ?
         WHERE order_id = ? AND line_key = ?",
    )
    .bind(ItemStatus::Removed.as_str())
    .bind(now)
    .bind(order_id)
    .bind(line_key)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

pub async fn mark_removed_by_id(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    item_id: i64,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE order_items SET status = ?, price = 0, updated_at = ?
         WHERE order_id = ? AND id = ?",
    )
    .bind(ItemStatus::Removed.as_str())
    .bind(now)
    .bind(order_id)
    .bind(item_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Move every non-removed line of the order to the order's new status
pub async fn cascade_status(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    status: OrderStatus,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE order_items SET status = ?, updated_at = ?
         WHERE order_id = ? AND status != ?",
    )
    .bind(status.item_status().as_str())
    .bind(now)
    .bind(order_id)
    .bind(ItemStatus::Removed.as_str())
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Null out ticket references so the tickets can be deleted
pub async fn detach_tickets(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE order_items SET station_ticket_id = NULL, updated_at = ?
         WHERE order_id = ? AND station_ticket_id IS NOT NULL",
    )
    .bind(now)
    .bind(order_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Opened lines not yet on a ticket, with their menu item's station
pub async fn pending_submission(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
) -> Result<Vec<(i64, Option<String>)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT oi.id, mi.station
         FROM order_items oi
         LEFT JOIN menu_items mi ON mi.id = oi.menu_item_id
         WHERE oi.order_id = ? AND oi.status = ? AND oi.station_ticket_id IS NULL
         ORDER BY oi.id",
    )
    .bind(order_id)
    .bind(ItemStatus::Opened.as_str())
    .fetch_all(db)
    .await
}

pub async fn submit(
    db: impl SqliteExecutor<'_>,
    item_id: i64,
    station_ticket_id: Option<i64>,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE order_items SET status = ?, station_ticket_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(ItemStatus::Ordered.as_str())
    .bind(station_ticket_id)
    .bind(now)
    .bind(item_id)
    .execute(db)
    .await?;
    Ok(())
}

/// (price, qty) of every line that counts towards the bill
pub async fn billable_lines(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
) -> Result<Vec<(f64, i64)>, sqlx::Error> {
    sqlx::query_as("SELECT price, qty FROM order_items WHERE order_id = ? AND status != ?")
        .bind(order_id)
        .bind(ItemStatus::Removed.as_str())
        .fetch_all(db)
        .await
}
