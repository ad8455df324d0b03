//! Order events - immutable facts in an order's log
//!
//! Every event carries a per-order sequence (1-based, gapless) which is the
//! AUTHORITATIVE ordering for state evolution. Payloads are a closed sum type;
//! anything the current build does not recognise is kept verbatim as
//! [`EventPayload::Unknown`] so old logs keep replaying.

use super::types::OrderStatus;
use crate::types::str_enum;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Order event - immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderEvent {
    /// Row id
    pub id: i64,
    /// Order this event belongs to
    pub order_id: i64,
    /// Per-order sequence, starting at 1
    pub sequence: i64,
    /// Event type as stored (may be a type this build does not know)
    pub event_type: String,
    pub entity_type: EntityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub source: EventSource,
    /// At most one event per (order, key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub payload: EventPayload,
    /// When the fact happened (Unix milliseconds)
    pub occurred_at: i64,
    /// When the row was written (Unix milliseconds)
    pub created_at: i64,
}

impl OrderEvent {
    /// Recognised event type, `None` for unknown types
    pub fn known_type(&self) -> Option<OrderEventType> {
        self.payload.known_type()
    }
}

str_enum! {
    /// Event types this build knows how to apply
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum OrderEventType {
        StatusChanged => "status_changed",
        ItemAdded => "item_added",
        ItemRemoved => "item_removed",
        ItemsSubmitted => "items_submitted",
        BillRequested => "bill_requested",
        Paid => "paid",
        Closed => "closed",
    }
}

str_enum! {
    /// What an event is about
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum EntityType {
        Order => "order",
        Item => "item",
        Payment => "payment",
    }
}

str_enum! {
    /// Who produced an event
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum EventSource {
        Guest => "guest",
        Staff => "staff",
        Webhook => "webhook",
        System => "system",
    }
}

// ========== Payloads ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChanged {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAdded {
    /// Stable line identity; falls back to the event's entity id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_key: Option<String>,
    #[serde(rename = "menuitem_id", alias = "menu_item_id")]
    pub menu_item_id: i64,
    #[serde(default = "default_qty")]
    pub qty: i64,
    /// Overrides the menu price when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

fn default_qty() -> i64 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRemoved {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsSubmitted {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillRequested {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload of `paid` and `closed`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentMarker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// Provider-specific extras (checkout metadata and the like), kept as sent
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Event payload
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    StatusChanged(StatusChanged),
    ItemAdded(ItemAdded),
    ItemRemoved(ItemRemoved),
    ItemsSubmitted(ItemsSubmitted),
    BillRequested(BillRequested),
    Paid(PaymentMarker),
    Closed(PaymentMarker),
    /// Type not recognised (or payload unreadable); kept as stored
    Unknown { event_type: String, payload: Value },
}

/// A stored payload could not be read as its declared type
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("unknown event type: {0}")]
    UnknownType(String),

    #[error("malformed {event_type} payload: {source}")]
    Malformed {
        event_type: OrderEventType,
        #[source]
        source: serde_json::Error,
    },
}

impl EventPayload {
    /// Stored event type string
    pub fn event_type(&self) -> &str {
        match self {
            EventPayload::Unknown { event_type, .. } => event_type,
            known => known
                .known_type()
                .map(|t| t.as_str())
                .unwrap_or_default(),
        }
    }

    pub fn known_type(&self) -> Option<OrderEventType> {
        Some(match self {
            EventPayload::StatusChanged(_) => OrderEventType::StatusChanged,
            EventPayload::ItemAdded(_) => OrderEventType::ItemAdded,
            EventPayload::ItemRemoved(_) => OrderEventType::ItemRemoved,
            EventPayload::ItemsSubmitted(_) => OrderEventType::ItemsSubmitted,
            EventPayload::BillRequested(_) => OrderEventType::BillRequested,
            EventPayload::Paid(_) => OrderEventType::Paid,
            EventPayload::Closed(_) => OrderEventType::Closed,
            EventPayload::Unknown { .. } => return None,
        })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EventPayload::Unknown { .. })
    }

    /// Strict decode: fails on unknown types and unreadable payloads
    pub fn try_decode(event_type: &str, payload: &Value) -> Result<Self, PayloadError> {
        let known: OrderEventType = event_type
            .parse()
            .map_err(|_| PayloadError::UnknownType(event_type.to_string()))?;

        // Empty payloads are stored as `{}`; treat JSON null the same way
        let empty = Value::Object(Default::default());
        let payload = if payload.is_null() { &empty } else { payload };

        let malformed = |source| PayloadError::Malformed {
            event_type: known,
            source,
        };

        Ok(match known {
            OrderEventType::StatusChanged => {
                EventPayload::StatusChanged(StatusChanged::deserialize(payload).map_err(malformed)?)
            }
            OrderEventType::ItemAdded => {
                EventPayload::ItemAdded(ItemAdded::deserialize(payload).map_err(malformed)?)
            }
            OrderEventType::ItemRemoved => {
                EventPayload::ItemRemoved(ItemRemoved::deserialize(payload).map_err(malformed)?)
            }
            OrderEventType::ItemsSubmitted => EventPayload::ItemsSubmitted(
                ItemsSubmitted::deserialize(payload).map_err(malformed)?,
            ),
            OrderEventType::BillRequested => EventPayload::BillRequested(
                BillRequested::deserialize(payload).map_err(malformed)?,
            ),
            OrderEventType::Paid => {
                EventPayload::Paid(PaymentMarker::deserialize(payload).map_err(malformed)?)
            }
            OrderEventType::Closed => {
                EventPayload::Closed(PaymentMarker::deserialize(payload).map_err(malformed)?)
            }
        })
    }

    /// Lenient decode used when reading the log: anything unreadable
    /// becomes [`EventPayload::Unknown`] instead of failing the read.
    pub fn decode(event_type: &str, payload: Value) -> Self {
        match Self::try_decode(event_type, &payload) {
            Ok(decoded) => decoded,
            Err(_) => EventPayload::Unknown {
                event_type: event_type.to_string(),
                payload,
            },
        }
    }

    /// Payload as stored in the log
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventPayload::StatusChanged(p) => p.serialize(serializer),
            EventPayload::ItemAdded(p) => p.serialize(serializer),
            EventPayload::ItemRemoved(p) => p.serialize(serializer),
            EventPayload::ItemsSubmitted(p) => p.serialize(serializer),
            EventPayload::BillRequested(p) => p.serialize(serializer),
            EventPayload::Paid(p) | EventPayload::Closed(p) => p.serialize(serializer),
            EventPayload::Unknown { payload, .. } => payload.serialize(serializer),
        }
    }
}
