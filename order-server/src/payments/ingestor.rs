//! WebhookIngestor - provider event → ledger → order events
//!
//! ```text
//! ingest(event)
//!   ├─ account.updated?          → merchant account upsert, done
//!   ├─ classify + resolve attempt / refund (missing is fine)
//!   ├─ BEGIN
//!   │    ├─ ledger append        (duplicate → rollback, re-check settlement)
//!   │    ├─ attempt / refund status
//!   │    └─ split share succeeded
//!   │  COMMIT
//!   └─ payment succeeded?        → settle (paid / closed) → project → hooks
//! ```
//!
//! Everything after the commit is idempotent, so a redelivery (and
//! [`WebhookIngestor::resume`]) re-runs it for an event whose ledger row
//! already exists. A delivery whose settlement failed is finished this way.

use serde::Serialize;
use serde_json::Value;
use shared::now_millis;
use shared::order::{OrderEventType, PaymentMarker};
use shared::payment::{
    LedgerEntityType, LedgerEventType, PaymentProvider, PaymentStatus, ProviderEvent,
};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::accounts::sync_merchant_account;
use super::classify::{
    PaymentRefs, WebhookEffect, amount_cents, classify, currency, effect, is_account_update,
    metadata, references,
};
use super::error::IngestResult;
use super::ledger::{self, AppendOutcome, NewLedgerEvent};
use super::settlement::{SettlementKeys, settle};
use crate::db::payment_attempts::{self, PaymentAttemptRow};
use crate::db::payment_refunds::{self, PaymentRefundRow};
use crate::db::{orders, split_payments};
use crate::orders::{OrdersManager, StoreError};

const PROVIDER: PaymentProvider = PaymentProvider::Stripe;

/// What one ingestion did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub provider_event_id: String,
    pub provider_event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_event_id: Option<i64>,
    /// Delivery was already in the ledger; only settlement was re-checked
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i64>,
    pub emitted: Vec<OrderEventType>,
}

impl IngestReport {
    fn new(event: &ProviderEvent) -> Self {
        Self {
            provider_event_id: event.provider_event_id.clone(),
            provider_event_type: event.provider_event_type.clone(),
            ledger_event_id: None,
            duplicate: false,
            order_id: None,
            emitted: Vec::new(),
        }
    }
}

/// Attempt or refund a provider event points at
#[derive(Debug)]
enum LedgerEntity {
    Attempt(PaymentAttemptRow),
    Refund(PaymentRefundRow),
    Unresolved,
}

impl LedgerEntity {
    fn id(&self) -> Option<i64> {
        match self {
            LedgerEntity::Attempt(a) => Some(a.id),
            LedgerEntity::Refund(r) => Some(r.id),
            LedgerEntity::Unresolved => None,
        }
    }

    fn order_id(&self) -> Option<i64> {
        match self {
            LedgerEntity::Attempt(a) => Some(a.order_id),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct WebhookIngestor {
    pool: SqlitePool,
    orders: OrdersManager,
}

impl std::fmt::Debug for WebhookIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookIngestor").finish_non_exhaustive()
    }
}

impl WebhookIngestor {
    pub fn new(orders: OrdersManager) -> Self {
        Self {
            pool: orders.pool().clone(),
            orders,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ingest(&self, event: &ProviderEvent) -> IngestResult<IngestReport> {
        let mut report = IngestReport::new(event);
        let event_type = event.provider_event_type.as_str();
        let object = event.object();
        let now = now_millis();

        if is_account_update(event_type) {
            sync_merchant_account(&self.pool, PROVIDER, object, now).await?;
            return Ok(report);
        }

        let class = classify(event_type);
        let refs = references(event_type, object);
        let entity = self.resolve_entity(event_type, class.entity_type, &refs).await?;
        let webhook_effect = effect(event_type);

        let mut tx = self.pool.begin().await?;
        let new = NewLedgerEvent {
            provider: PROVIDER,
            provider_event_id: event.provider_event_id.clone(),
            provider_event_type: event.provider_event_type.clone(),
            occurred_at: event.occurred_at,
            entity_type: class.entity_type,
            entity_id: entity.id(),
            event_type: class.event_type,
            amount_cents: amount_cents(event_type, object),
            currency: currency(object),
            metadata: Value::Object(metadata(object)),
            raw_event_payload: event.payload.clone(),
            created_at: now,
        };
        let ledger_event = match ledger::append(&mut *tx, &new).await? {
            AppendOutcome::Inserted(row) => row,
            AppendOutcome::Duplicate(existing) => {
                tx.rollback().await?;
                info!(
                    provider_event_id = %event.provider_event_id,
                    provider_event_type = %event_type,
                    ledger_event_id = existing.id,
                    "Duplicate webhook delivery, ledger unchanged"
                );
                report.duplicate = true;
                report.ledger_event_id = Some(existing.id);
                if webhook_effect == WebhookEffect::PaymentSucceeded {
                    self.settle_order(event, &refs, &entity, &mut report).await?;
                }
                return Ok(report);
            }
        };
        report.ledger_event_id = Some(ledger_event.id);

        update_entity_status(&mut *tx, &entity, class.event_type, now).await?;
        if webhook_effect == WebhookEffect::PaymentSucceeded {
            mark_split_share(&mut *tx, &refs, &entity, now).await?;
        }
        tx.commit().await?;

        debug!(
            provider_event_id = %event.provider_event_id,
            ledger_event_id = ledger_event.id,
            entity_type = %class.entity_type,
            event_type = %class.event_type,
            entity_id = ?entity.id(),
            "Ledger event recorded"
        );

        match webhook_effect {
            WebhookEffect::PaymentSucceeded => {
                self.settle_order(event, &refs, &entity, &mut report).await?;
            }
            WebhookEffect::PaymentFailed | WebhookEffect::Refunded => {}
            WebhookEffect::AccountUpdated | WebhookEffect::None => {
                debug!(provider_event_type = %event_type, "No effect for event type");
            }
        }

        info!(
            provider_event_id = %event.provider_event_id,
            provider_event_type = %event_type,
            order_id = ?report.order_id,
            emitted = report.emitted.len(),
            "Webhook ingested"
        );
        Ok(report)
    }

    /// Re-run the order effects of a payment already in the ledger
    pub async fn resume(&self, event: &ProviderEvent) -> IngestResult<IngestReport> {
        let mut report = IngestReport::new(event);
        let event_type = event.provider_event_type.as_str();
        if effect(event_type) != WebhookEffect::PaymentSucceeded {
            return Ok(report);
        }
        let class = classify(event_type);
        let refs = references(event_type, event.object());
        let entity = self.resolve_entity(event_type, class.entity_type, &refs).await?;
        self.settle_order(event, &refs, &entity, &mut report).await?;
        Ok(report)
    }

    /// Not-found is not an error: the ledger row is written without an entity
    async fn resolve_entity(
        &self,
        event_type: &str,
        entity_type: LedgerEntityType,
        refs: &PaymentRefs,
    ) -> Result<LedgerEntity, sqlx::Error> {
        match entity_type {
            LedgerEntityType::PaymentAttempt => {
                let attempt = match refs.payment_attempt_id {
                    Some(id) => payment_attempts::find(&self.pool, id).await?,
                    None => match refs.object_id.as_deref() {
                        Some(provider_id) => {
                            payment_attempts::find_by_provider_ref(&self.pool, PROVIDER, provider_id)
                                .await?
                        }
                        None => None,
                    },
                };
                Ok(attempt.map_or(LedgerEntity::Unresolved, LedgerEntity::Attempt))
            }
            LedgerEntityType::Refund if event_type.starts_with("refund.") => {
                let refund = match refs.object_id.as_deref() {
                    Some(provider_id) => {
                        payment_refunds::find_by_provider_ref(&self.pool, PROVIDER, provider_id).await?
                    }
                    None => None,
                };
                Ok(refund.map_or(LedgerEntity::Unresolved, LedgerEntity::Refund))
            }
            LedgerEntityType::Refund => Ok(LedgerEntity::Unresolved),
        }
    }

    /// Settlement errors surface as `IngestError::Store`: the ledger row is already durable
    async fn settle_order(
        &self,
        event: &ProviderEvent,
        refs: &PaymentRefs,
        entity: &LedgerEntity,
        report: &mut IngestReport,
    ) -> Result<(), StoreError> {
        let Some(order_id) = refs.order_id.or(entity.order_id()) else {
            warn!(
                provider_event_id = %event.provider_event_id,
                "Payment succeeded without an order reference"
            );
            return Ok(());
        };
        if !orders::exists(&self.pool, order_id).await? {
            warn!(
                provider_event_id = %event.provider_event_id,
                order_id,
                "Payment references unknown order"
            );
            return Ok(());
        }

        let keys = match refs.split_payment_id {
            Some(_) => SettlementKeys::for_split(PROVIDER, order_id),
            None => SettlementKeys::for_provider_event(PROVIDER, &event.provider_event_id),
        };
        let mut extra = metadata(event.object());
        extra.remove("provider");
        extra.remove("external_ref");
        let marker = PaymentMarker {
            provider: Some(PROVIDER.to_string()),
            external_ref: refs.object_id.clone(),
            extra,
        };
        let outcome = settle(
            self.orders.store(),
            order_id,
            marker,
            &keys,
            event.occurred_at,
        )
        .await?;

        report.order_id = Some(order_id);
        report.emitted = outcome.emitted();
        self.orders.project_and_notify(order_id).await?;
        Ok(())
    }
}

async fn update_entity_status(
    conn: &mut SqliteConnection,
    entity: &LedgerEntity,
    event_type: LedgerEventType,
    now: i64,
) -> Result<(), sqlx::Error> {
    match (entity, event_type) {
        (LedgerEntity::Attempt(attempt), LedgerEventType::Succeeded) => {
            payment_attempts::update_status(conn, attempt.id, PaymentStatus::Succeeded, now).await
        }
        (LedgerEntity::Attempt(attempt), LedgerEventType::Failed) => {
            payment_attempts::update_status(conn, attempt.id, PaymentStatus::Failed, now).await
        }
        (LedgerEntity::Refund(refund), LedgerEventType::Refunded) => {
            payment_refunds::update_status(conn, refund.id, PaymentStatus::Succeeded, now).await
        }
        _ => Ok(()),
    }
}

async fn mark_split_share(
    conn: &mut SqliteConnection,
    refs: &PaymentRefs,
    entity: &LedgerEntity,
    now: i64,
) -> Result<(), sqlx::Error> {
    let order_id = refs.order_id.or(entity.order_id());
    let (Some(split_id), Some(order_id)) = (refs.split_payment_id, order_id) else {
        return Ok(());
    };
    let marked = split_payments::mark_succeeded(
        conn,
        order_id,
        split_id,
        refs.checkout_session_id.as_deref(),
        refs.payment_intent_id.as_deref(),
        now,
    )
    .await?;
    if marked {
        info!(order_id, split_payment_id = split_id, "Split payment succeeded");
    } else {
        warn!(order_id, split_payment_id = split_id, "Split payment not found for order");
    }
    Ok(())
}
