use shared::payment::{PaymentProvider, PaymentStatus};
use sqlx::SqliteExecutor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentAttemptRow {
    pub id: i64,
    pub order_id: i64,
    pub provider: String,
    pub provider_payment_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct CreatePaymentAttempt<'a> {
    pub order_id: i64,
    pub provider: PaymentProvider,
    pub provider_payment_id: Option<&'a str>,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub now: i64,
}

const COLUMNS: &str =
    "id, order_id, provider, provider_payment_id, amount_cents, currency, status, created_at, updated_at";

pub async fn create(
    db: impl SqliteExecutor<'_>,
    attempt: &CreatePaymentAttempt<'_>,
) -> Result<PaymentAttemptRow, sqlx::Error> {
    let sql = format!(
        "INSERT INTO payment_attempts (order_id, provider, provider_payment_id, amount_cents, currency, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, PaymentAttemptRow>(&sql)
        .bind(attempt.order_id)
        .bind(attempt.provider.as_str())
        .bind(attempt.provider_payment_id)
        .bind(attempt.amount_cents)
        .bind(attempt.currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(attempt.now)
        .bind(attempt.now)
        .fetch_one(db)
        .await
}

pub async fn find(
    db: impl SqliteExecutor<'_>,
    id: i64,
) -> Result<Option<PaymentAttemptRow>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM payment_attempts WHERE id = ?");
    sqlx::query_as::<_, PaymentAttemptRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_provider_ref(
    db: impl SqliteExecutor<'_>,
    provider: PaymentProvider,
    provider_payment_id: &str,
) -> Result<Option<PaymentAttemptRow>, sqlx::Error> {
    let sql = format!(
        "SELECT {COLUMNS} FROM payment_attempts WHERE provider = ? AND provider_payment_id = ?"
    );
    sqlx::query_as::<_, PaymentAttemptRow>(&sql)
        .bind(provider.as_str())
        .bind(provider_payment_id)
        .fetch_optional(db)
        .await
}

pub async fn update_status(
    db: impl SqliteExecutor<'_>,
    id: i64,
    status: PaymentStatus,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_attempts SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
