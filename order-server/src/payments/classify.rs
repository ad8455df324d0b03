//! Provider event normalization
//!
//! Pure functions from a Stripe event type and its `data.object` to ledger
//! classification, amounts, and the order / split / attempt references the
//! effect handlers need. Missing or oddly typed fields yield `None`.

use serde_json::{Map, Value};
use shared::payment::{LedgerEntityType, LedgerEventType};

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";
const PAYMENT_INTENT_FAILED: &str = "payment_intent.payment_failed";
const CHARGE_REFUNDED: &str = "charge.refunded";
const ACCOUNT_UPDATED: &str = "account.updated";

/// Ledger classification of a provider event type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub entity_type: LedgerEntityType,
    pub event_type: LedgerEventType,
}

/// Side effect dispatched after the ledger append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEffect {
    /// checkout completed / payment intent succeeded
    PaymentSucceeded,
    PaymentFailed,
    Refunded,
    AccountUpdated,
    /// Ledger row only
    None,
}

fn is_refund_type(provider_event_type: &str) -> bool {
    provider_event_type == CHARGE_REFUNDED || provider_event_type.starts_with("refund.")
}

pub fn classify(provider_event_type: &str) -> Classification {
    let (entity_type, event_type) = match provider_event_type {
        CHECKOUT_COMPLETED | PAYMENT_INTENT_SUCCEEDED => {
            (LedgerEntityType::PaymentAttempt, LedgerEventType::Succeeded)
        }
        PAYMENT_INTENT_FAILED => (LedgerEntityType::PaymentAttempt, LedgerEventType::Failed),
        t if is_refund_type(t) => (LedgerEntityType::Refund, LedgerEventType::Refunded),
        _ => (LedgerEntityType::PaymentAttempt, LedgerEventType::Created),
    };
    Classification {
        entity_type,
        event_type,
    }
}

pub fn effect(provider_event_type: &str) -> WebhookEffect {
    match provider_event_type {
        CHECKOUT_COMPLETED | PAYMENT_INTENT_SUCCEEDED => WebhookEffect::PaymentSucceeded,
        PAYMENT_INTENT_FAILED => WebhookEffect::PaymentFailed,
        ACCOUNT_UPDATED => WebhookEffect::AccountUpdated,
        t if is_refund_type(t) => WebhookEffect::Refunded,
        _ => WebhookEffect::None,
    }
}

/// Account status updates carry no money and get no ledger row
pub fn is_account_update(provider_event_type: &str) -> bool {
    provider_event_type == ACCOUNT_UPDATED
}

/// Amount in minor units, read from the field the event type uses
pub fn amount_cents(provider_event_type: &str, object: &Value) -> Option<i64> {
    match provider_event_type {
        CHECKOUT_COMPLETED => object.get("amount_total")?.as_i64(),
        PAYMENT_INTENT_SUCCEEDED | PAYMENT_INTENT_FAILED => object
            .get("amount_received")
            .and_then(Value::as_i64)
            .or_else(|| object.get("amount")?.as_i64()),
        CHARGE_REFUNDED => object.get("amount_refunded")?.as_i64(),
        t if t.starts_with("refund.") => object.get("amount")?.as_i64(),
        _ => None,
    }
}

/// Upper-cased ISO currency code
pub fn currency(object: &Value) -> Option<String> {
    object
        .get("currency")?
        .as_str()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
}

/// Provider `metadata` map of the object, empty when absent or not a map
pub fn metadata(object: &Value) -> Map<String, Value> {
    match object.get("metadata") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// Ids arrive as JSON numbers or numeric strings
fn id_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn metadata_id(object: &Value, keys: &[&str]) -> Option<i64> {
    let metadata = object.get("metadata")?;
    keys.iter().find_map(|key| metadata.get(*key).and_then(id_value))
}

fn non_empty_str<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key)?.as_str().filter(|s| !s.is_empty())
}

/// References a payment object carries back to our rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentRefs {
    pub order_id: Option<i64>,
    pub split_payment_id: Option<i64>,
    pub payment_attempt_id: Option<i64>,
    /// Provider id of the object itself (session, intent, refund ...)
    pub object_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub payment_intent_id: Option<String>,
}

pub fn references(provider_event_type: &str, object: &Value) -> PaymentRefs {
    let object_id = non_empty_str(object, "id").map(str::to_string);
    let (checkout_session_id, payment_intent_id) = match provider_event_type {
        CHECKOUT_COMPLETED => (
            object_id.clone(),
            non_empty_str(object, "payment_intent").map(str::to_string),
        ),
        t if t.starts_with("payment_intent.") => (None, object_id.clone()),
        _ => (None, None),
    };

    PaymentRefs {
        order_id: metadata_id(object, &["order_id", "orderId"])
            .or_else(|| object.get("client_reference_id").and_then(id_value)),
        split_payment_id: metadata_id(object, &["split_payment_id", "ordr_split_payment_id"]),
        payment_attempt_id: metadata_id(object, &["payment_attempt_id"]),
        object_id,
        checkout_session_id,
        payment_intent_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification_table() {
        let cases = [
            (CHECKOUT_COMPLETED, LedgerEntityType::PaymentAttempt, LedgerEventType::Succeeded),
            (PAYMENT_INTENT_SUCCEEDED, LedgerEntityType::PaymentAttempt, LedgerEventType::Succeeded),
            (PAYMENT_INTENT_FAILED, LedgerEntityType::PaymentAttempt, LedgerEventType::Failed),
            (CHARGE_REFUNDED, LedgerEntityType::Refund, LedgerEventType::Refunded),
            ("refund.updated", LedgerEntityType::Refund, LedgerEventType::Refunded),
            ("customer.created", LedgerEntityType::PaymentAttempt, LedgerEventType::Created),
        ];
        for (event_type, entity, kind) in cases {
            let class = classify(event_type);
            assert_eq!(class.entity_type, entity, "{event_type}");
            assert_eq!(class.event_type, kind, "{event_type}");
        }
    }

    #[test]
    fn test_effects() {
        assert_eq!(effect(CHECKOUT_COMPLETED), WebhookEffect::PaymentSucceeded);
        assert_eq!(effect(PAYMENT_INTENT_SUCCEEDED), WebhookEffect::PaymentSucceeded);
        assert_eq!(effect(ACCOUNT_UPDATED), WebhookEffect::AccountUpdated);
        assert_eq!(effect("refund.created"), WebhookEffect::Refunded);
        assert_eq!(effect("invoice.paid"), WebhookEffect::None);
        assert!(is_account_update(ACCOUNT_UPDATED));
        assert!(!is_account_update(CHECKOUT_COMPLETED));
    }

    #[test]
    fn test_amount_per_event_type() {
        let object = json!({
            "amount_total": 1200,
            "amount_received": 1100,
            "amount": 1000,
            "amount_refunded": 300
        });
        assert_eq!(amount_cents(CHECKOUT_COMPLETED, &object), Some(1200));
        assert_eq!(amount_cents(PAYMENT_INTENT_SUCCEEDED, &object), Some(1100));
        assert_eq!(amount_cents(CHARGE_REFUNDED, &object), Some(300));
        assert_eq!(amount_cents("refund.created", &object), Some(1000));
        assert_eq!(amount_cents("customer.created", &object), None);

        let fallback = json!({ "amount": 900 });
        assert_eq!(amount_cents(PAYMENT_INTENT_SUCCEEDED, &fallback), Some(900));
    }

    #[test]
    fn test_malformed_amount_and_currency_yield_none() {
        let object = json!({ "amount_total": "lots", "currency": 42 });
        assert_eq!(amount_cents(CHECKOUT_COMPLETED, &object), None);
        assert_eq!(currency(&object), None);
        assert_eq!(currency(&json!({ "currency": "" })), None);
        assert_eq!(currency(&json!({ "currency": "eur" })), Some("EUR".to_string()));
        assert_eq!(amount_cents(CHECKOUT_COMPLETED, &Value::Null), None);
    }

    #[test]
    fn test_checkout_references() {
        let object = json!({
            "id": "cs_1",
            "payment_intent": "pi_1",
            "metadata": { "order_id": "42", "ordr_split_payment_id": 7 }
        });
        let refs = references(CHECKOUT_COMPLETED, &object);
        assert_eq!(refs.order_id, Some(42));
        assert_eq!(refs.split_payment_id, Some(7));
        assert_eq!(refs.checkout_session_id.as_deref(), Some("cs_1"));
        assert_eq!(refs.payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_payment_intent_references() {
        let object = json!({
            "id": "pi_9",
            "client_reference_id": 5,
            "metadata": { "orderId": "not-a-number", "payment_attempt_id": "3" }
        });
        let refs = references(PAYMENT_INTENT_SUCCEEDED, &object);
        assert_eq!(refs.order_id, Some(5));
        assert_eq!(refs.payment_attempt_id, Some(3));
        assert_eq!(refs.split_payment_id, None);
        assert_eq!(refs.checkout_session_id, None);
        assert_eq!(refs.payment_intent_id.as_deref(), Some("pi_9"));
    }

    #[test]
    fn test_missing_object_has_no_references() {
        assert_eq!(references(CHECKOUT_COMPLETED, &Value::Null), PaymentRefs::default());
    }

    #[test]
    fn test_metadata_defaults_to_empty_map() {
        let object = json!({ "metadata": { "order_id": "7" } });
        assert_eq!(metadata(&object).get("order_id"), Some(&json!("7")));
        assert!(metadata(&json!({ "metadata": "x" })).is_empty());
        assert!(metadata(&Value::Null).is_empty());
    }
}
