use shared::payment::PaymentStatus;
use sqlx::SqliteExecutor;

/// One share of an order settled by a separate payment
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SplitPaymentRow {
    pub id: i64,
    pub order_id: i64,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub provider_checkout_session_id: Option<String>,
    pub provider_payment_intent_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

const COLUMNS: &str = "id, order_id, amount_cents, currency, status, \
     provider_checkout_session_id, provider_payment_intent_id, created_at, updated_at";

pub async fn create(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    amount_cents: i64,
    currency: &str,
    now: i64,
) -> Result<SplitPaymentRow, sqlx::Error> {
    let sql = format!(
        "INSERT INTO split_payments (order_id, amount_cents, currency, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, SplitPaymentRow>(&sql)
        .bind(order_id)
        .bind(amount_cents)
        .bind(currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(now)
        .bind(now)
        .fetch_one(db)
        .await
}

pub async fn list_for_order(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
) -> Result<Vec<SplitPaymentRow>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM split_payments WHERE order_id = ? ORDER BY id");
    sqlx::query_as::<_, SplitPaymentRow>(&sql)
        .bind(order_id)
        .fetch_all(db)
        .await
}

/// Mark one share succeeded, keeping provider references already recorded.
/// Returns false when the share does not belong to the order.
pub async fn mark_succeeded(
    db: impl SqliteExecutor<'_>,
    order_id: i64,
    split_payment_id: i64,
    checkout_session_id: Option<&str>,
    payment_intent_id: Option<&str>,
    now: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE split_payments SET
            status = ?,
            provider_checkout_session_id = COALESCE(?, provider_checkout_session_id),
            provider_payment_intent_id = COALESCE(?, provider_payment_intent_id),
            updated_at = ?
         WHERE id = ? AND order_id = ?",
    )
    .bind(PaymentStatus::Succeeded.as_str())
    .bind(checkout_session_id)
    .bind(payment_intent_id)
    .bind(now)
    .bind(split_payment_id)
    .bind(order_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// True when every share of the order has succeeded (vacuously true with no shares)
pub async fn all_succeeded(db: impl SqliteExecutor<'_>, order_id: i64) -> Result<bool, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT NOT EXISTS(SELECT 1 FROM split_payments WHERE order_id = ? AND status != ?)",
    )
    .bind(order_id)
    .bind(PaymentStatus::Succeeded.as_str())
    .fetch_one(db)
    .await?;
    Ok(row.0 != 0)
}
