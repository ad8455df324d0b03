use shared::payment::{MerchantAccountStatus, PaymentProvider};
use sqlx::SqliteExecutor;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MerchantAccountRow {
    pub id: i64,
    pub provider: String,
    pub provider_account_id: String,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub struct UpsertMerchantAccount<'a> {
    pub provider: PaymentProvider,
    pub provider_account_id: &'a str,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
    pub details_submitted: bool,
    pub status: MerchantAccountStatus,
    pub now: i64,
}

pub async fn upsert(
    db: impl SqliteExecutor<'_>,
    account: &UpsertMerchantAccount<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO merchant_accounts
            (provider, provider_account_id, charges_enabled, payouts_enabled, details_submitted, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (provider, provider_account_id) DO UPDATE SET
            charges_enabled = excluded.charges_enabled,
            payouts_enabled = excluded.payouts_enabled,
            details_submitted = excluded.details_submitted,
            status = excluded.status,
            updated_at = excluded.updated_at",
    )
    .bind(account.provider.as_str())
    .bind(account.provider_account_id)
    .bind(account.charges_enabled)
    .bind(account.payouts_enabled)
    .bind(account.details_submitted)
    .bind(account.status.as_str())
    .bind(account.now)
    .bind(account.now)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find(
    db: impl SqliteExecutor<'_>,
    provider: PaymentProvider,
    provider_account_id: &str,
) -> Result<Option<MerchantAccountRow>, sqlx::Error> {
    sqlx::query_as::<_, MerchantAccountRow>(
        "SELECT id, provider, provider_account_id, charges_enabled, payouts_enabled,
                details_submitted, status, created_at, updated_at
         FROM merchant_accounts WHERE provider = ? AND provider_account_id = ?",
    )
    .bind(provider.as_str())
    .bind(provider_account_id)
    .fetch_optional(db)
    .await
}
