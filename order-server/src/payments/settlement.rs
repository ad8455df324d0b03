//! Settlement: webhook-driven `paid` / `closed` emission
//!
//! Both appends run through [`EventStore::emit_guarded`], so the existence
//! checks happen under the order lock in the same transaction as the insert:
//!
//! - `paid`: first of its type, and every split payment succeeded
//! - `closed`: first of its type, and only once `paid` exists
//!
//! Redelivered or concurrent deliveries therefore emit at most one of each.

use shared::order::{EntityType, EventPayload, EventSource, OrderEventType, PaymentMarker};
use shared::payment::PaymentProvider;
use tracing::{debug, info};

use crate::orders::{EmitGuard, EmitOutcome, EventStore, NewOrderEvent, StoreResult};

/// Idempotency keys for one settlement attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementKeys {
    pub paid: String,
    pub closed: String,
}

impl SettlementKeys {
    /// Single payment: keyed by the provider event
    pub fn for_provider_event(provider: PaymentProvider, provider_event_id: &str) -> Self {
        Self {
            paid: format!("{provider}:paid:{provider_event_id}"),
            closed: format!("{provider}:closed:{provider_event_id}"),
        }
    }

    /// Split payments settle once per order, whichever share completes last
    pub fn for_split(provider: PaymentProvider, order_id: i64) -> Self {
        Self {
            paid: format!("{provider}:split_paid:{order_id}"),
            closed: format!("{provider}:split_closed:{order_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub paid: EmitOutcome,
    pub closed: EmitOutcome,
}

impl SettlementOutcome {
    /// Event types appended by this run
    pub fn emitted(&self) -> Vec<OrderEventType> {
        let mut emitted = Vec::new();
        if self.paid.is_appended() {
            emitted.push(OrderEventType::Paid);
        }
        if self.closed.is_appended() {
            emitted.push(OrderEventType::Closed);
        }
        emitted
    }
}

/// Re-evaluate settlement and emit whatever is due; `marker` goes into both events
pub async fn settle(
    store: &EventStore,
    order_id: i64,
    marker: PaymentMarker,
    keys: &SettlementKeys,
    occurred_at: i64,
) -> StoreResult<SettlementOutcome> {
    let paid = store
        .emit_guarded(
            NewOrderEvent::new(order_id, EventPayload::Paid(marker.clone()))
                .entity(EntityType::Payment, Some(order_id.to_string()))
                .source(EventSource::Webhook)
                .idempotency_key(keys.paid.as_str())
                .occurred_at(occurred_at),
            EmitGuard::FirstOfTypeWhenSettled,
        )
        .await?;
    log_outcome(order_id, OrderEventType::Paid, &paid);

    let closed = store
        .emit_guarded(
            NewOrderEvent::new(order_id, EventPayload::Closed(marker))
                .source(EventSource::Webhook)
                .idempotency_key(keys.closed.as_str())
                .occurred_at(occurred_at),
            EmitGuard::FirstOfTypeAfter(OrderEventType::Paid),
        )
        .await?;
    log_outcome(order_id, OrderEventType::Closed, &closed);

    Ok(SettlementOutcome { paid, closed })
}

fn log_outcome(order_id: i64, event_type: OrderEventType, outcome: &EmitOutcome) {
    match outcome {
        EmitOutcome::Appended(event) => info!(
            order_id,
            event_type = %event_type,
            sequence = event.sequence,
            "Settlement event emitted"
        ),
        EmitOutcome::Existing(event) => debug!(
            order_id,
            event_type = %event_type,
            sequence = event.sequence,
            "Settlement event already recorded under this key"
        ),
        EmitOutcome::Skipped => debug!(order_id, event_type = %event_type, "Settlement guard not met"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        let single = SettlementKeys::for_provider_event(PaymentProvider::Stripe, "evt_1");
        assert_eq!(single.paid, "stripe:paid:evt_1");
        assert_eq!(single.closed, "stripe:closed:evt_1");

        let split = SettlementKeys::for_split(PaymentProvider::Stripe, 42);
        assert_eq!(split.paid, "stripe:split_paid:42");
        assert_eq!(split.closed, "stripe:split_closed:42");
    }

    #[test]
    fn test_emitted_lists_appended_only() {
        let outcome = SettlementOutcome {
            paid: EmitOutcome::Skipped,
            closed: EmitOutcome::Skipped,
        };
        assert!(outcome.emitted().is_empty());
    }
}
