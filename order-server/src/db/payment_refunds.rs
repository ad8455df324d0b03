use shared::payment::{PaymentProvider, PaymentStatus};
use sqlx::SqliteExecutor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRefundRow {
    pub id: i64,
    pub payment_attempt_id: Option<i64>,
    pub provider: String,
    pub provider_refund_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct CreatePaymentRefund<'a> {
    pub payment_attempt_id: Option<i64>,
    pub provider: PaymentProvider,
    pub provider_refund_id: Option<&'a str>,
    pub amount_cents: i64,
    pub currency: &'a str,
    pub now: i64,
}

const COLUMNS: &str = "id, payment_attempt_id, provider, provider_refund_id, amount_cents, currency, status, created_at, updated_at";

pub async fn create(
    db: impl SqliteExecutor<'_>,
    refund: &CreatePaymentRefund<'_>,
) -> Result<PaymentRefundRow, sqlx::Error> {
    let sql = format!(
        "INSERT INTO payment_refunds (payment_attempt_id, provider, provider_refund_id, amount_cents, currency, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {COLUMNS}"
    );
    sqlx::query_as::<_, PaymentRefundRow>(&sql)
        .bind(refund.payment_attempt_id)
        .bind(refund.provider.as_str())
        .bind(refund.provider_refund_id)
        .bind(refund.amount_cents)
        .bind(refund.currency)
        .bind(PaymentStatus::Pending.as_str())
        .bind(refund.now)
        .bind(refund.now)
        .fetch_one(db)
        .await
}

pub async fn find(
    db: impl SqliteExecutor<'_>,
    id: i64,
) -> Result<Option<PaymentRefundRow>, sqlx::Error> {
    let sql = format!("SELECT {COLUMNS} FROM payment_refunds WHERE id = ?");
    sqlx::query_as::<_, PaymentRefundRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_provider_ref(
    db: impl SqliteExecutor<'_>,
    provider: PaymentProvider,
    provider_refund_id: &str,
) -> Result<Option<PaymentRefundRow>, sqlx::Error> {
    let sql =
        format!("SELECT {COLUMNS} FROM payment_refunds WHERE provider = ? AND provider_refund_id = ?");
    sqlx::query_as::<_, PaymentRefundRow>(&sql)
        .bind(provider.as_str())
        .bind(provider_refund_id)
        .fetch_optional(db)
        .await
}

pub async fn update_status(
    db: impl SqliteExecutor<'_>,
    id: i64,
    status: PaymentStatus,
    now: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE payment_refunds SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
