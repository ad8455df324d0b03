//! Merchant account sync from `account.updated`

use serde_json::Value;
use shared::payment::{MerchantAccountStatus, PaymentProvider};
use sqlx::SqliteExecutor;
use tracing::{info, warn};

use crate::db::merchant_accounts::{self, UpsertMerchantAccount};

fn flag(object: &Value, key: &str) -> bool {
    object.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Upsert the account's capability flags. `None` when the object has no id.
pub async fn sync_merchant_account(
    db: impl SqliteExecutor<'_>,
    provider: PaymentProvider,
    object: &Value,
    now: i64,
) -> Result<Option<MerchantAccountStatus>, sqlx::Error> {
    let Some(account_id) = object.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())
    else {
        warn!(provider = %provider, "Account update without account id, ignoring");
        return Ok(None);
    };

    let charges_enabled = flag(object, "charges_enabled");
    let payouts_enabled = flag(object, "payouts_enabled");
    let details_submitted = flag(object, "details_submitted");
    let status =
        MerchantAccountStatus::from_flags(charges_enabled, payouts_enabled, details_submitted);

    merchant_accounts::upsert(
        db,
        &UpsertMerchantAccount {
            provider,
            provider_account_id: account_id,
            charges_enabled,
            payouts_enabled,
            details_submitted,
            status,
            now,
        },
    )
    .await?;

    info!(provider = %provider, account_id, status = %status, "Merchant account synced");
    Ok(Some(status))
}
