use shared::ParseEnumError;
use shared::order::OrderStatus;
use sqlx::SqliteExecutor;

/// Live order aggregate row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub status: String,
    pub public_slug: Option<String>,
    pub nett: f64,
    pub tip: f64,
    pub service: f64,
    pub tax: f64,
    pub gross: f64,
    pub ordered_at: Option<i64>,
    pub preparing_at: Option<i64>,
    pub ready_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub bill_requested_at: Option<i64>,
    pub paid_at: Option<i64>,
    pub closed_at: Option<i64>,
    pub last_projected_event_sequence: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrderRow {
    pub fn status(&self) -> Result<OrderStatus, ParseEnumError> {
        self.status.parse()
    }
}

pub struct CreateOrder<'a> {
    pub public_slug: Option<&'a str>,
    pub tip: f64,
    pub service: f64,
    pub tax: f64,
    pub now: i64,
}

const COLUMNS: &str = "id, status, public_slug, nett, tip, service, tax, gross, \
     ordered_at, preparing_at, ready_at, delivered_at, bill_requested_at, paid_at, closed_at, \
     last_projected_event_sequence, created_at, updated_at";

/// Open a new order in `opened` status with an empty projection cursor
pub async fn create(
    db: impl SqliteExecutor<'_>,
    order: &CreateOrder<'_>,
) -> Result<OrderRow, sqlx::Error> {
    let sql = format!(
        "INSERT INTO orders (status, public_slug, tip, service, tax, gross, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(OrderStatus::Opened.as_str())
        .bind(order.public_slug)
        .bind(order.tip)
        .bind(order.service)
        .bind(order.tax)
        .bind(order.tip + order.service + order.tax)
        .bind(order.now)
        .bind(order.now)
        .fetch_one(db)
        .await
}

pub async fn find(db: impl SqliteExecutor<'_>, id: i64) -> Result<Option<OrderRow>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM orders WHERE id = ?");
    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn exists(db: impl SqliteExecutor<'_>, id: i64) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM orders WHERE id = ?)")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(row.0 != 0)
}

/// Write the order row so the transaction holds the write lock before it
/// reads anything. Returns false when the order does not exist.
pub async fn touch(db: impl SqliteExecutor<'_>, id: i64, now: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// First-entry timestamp column for a status
fn stamp_column(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Opened | OrderStatus::Ordered => "ordered_at",
        OrderStatus::Preparing => "preparing_at",
        OrderStatus::Ready => "ready_at",
        OrderStatus::Delivered => "delivered_at",
        OrderStatus::BillRequested => "bill_requested_at",
        OrderStatus::Paid => "paid_at",
        OrderStatus::Closed => "closed_at",
    }
}

/// Set the status and stamp its timestamp column if it is still unset
pub async fn set_status(
    db: impl SqliteExecutor<'_>,
    id: i64,
    status: OrderStatus,
    stamped_at: i64,
    now: i64,
) -> Result<(), sqlx::Error> {
    let column = stamp_column(status);
    let sql = format!(
        "UPDATE orders SET status = ?, {column} = COALESCE({column}, ?), updated_at = ? WHERE id = ?"
    );
    sqlx::query(&sql)
        .bind(status.as_str())
        .bind(stamped_at)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_totals(
    db: impl SqliteExecutor<'_>,
    id: i64,
    nett: f64,
    gross: f64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET nett = ?, gross = ?, updated_at = ? WHERE id = ?")
        .bind(nett)
        .bind(gross)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn advance_cursor(
    db: impl SqliteExecutor<'_>,
    id: i64,
    sequence: i64,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET last_projected_event_sequence = ?, updated_at = ?
         WHERE id = ? AND last_projected_event_sequence < ?",
    )
    .bind(sequence)
    .bind(now)
    .bind(id)
    .bind(sequence)
    .execute(db)
    .await?;
    Ok(())
}
