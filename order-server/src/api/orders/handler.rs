//! Order API Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use serde_json::Value;
use shared::order::{
    EntityType, EventPayload, EventSource, OrderEvent, OrderStateSnapshot, PayloadError,
};
use uuid::Uuid;

use crate::core::ServerState;
use crate::orders::{AuditReport, NewOrderEvent, Reduction};
use crate::utils::{AppError, AppResponse, AppResult, ok};

#[derive(Debug, Default, Deserialize)]
pub struct OpenOrderRequest {
    #[serde(default)]
    pub public_slug: Option<String>,
}

/// Open an order; the body is optional
pub async fn open(
    State(state): State<ServerState>,
    body: Bytes,
) -> AppResult<Json<AppResponse<OrderStateSnapshot>>> {
    let request: OpenOrderRequest = if body.is_empty() {
        OpenOrderRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::validation(e.to_string()))?
    };
    let order = state.orders.open_order(request.public_slug.as_deref()).await?;
    let snapshot = state
        .orders
        .snapshot(order.id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {}", order.id)))?;
    Ok(ok(snapshot))
}

pub async fn snapshot(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<OrderStateSnapshot>>> {
    let snapshot = state
        .orders
        .snapshot(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {id}")))?;
    Ok(ok(snapshot))
}

#[derive(Debug, Deserialize)]
pub struct EmitEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub entity_id: Option<String>,
    /// Defaults to staff
    #[serde(default)]
    pub source: Option<EventSource>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<i64>,
}

/// Append an event, project it, and return the stored event
pub async fn emit(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(request): Json<EmitEventRequest>,
) -> AppResult<Json<AppResponse<OrderEvent>>> {
    let new = build_event(id, request)?;
    let event = state.orders.record(new).await?;
    Ok(ok(event))
}

pub async fn replay(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<Reduction>>> {
    Ok(ok(state.orders.replay(id).await?))
}

pub async fn audit(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<AppResponse<AuditReport>>> {
    Ok(ok(state.orders.audit(id).await?))
}

/// Unknown types are stored as-is (replay reports them); malformed known
/// payloads are rejected
fn build_event(order_id: i64, request: EmitEventRequest) -> AppResult<NewOrderEvent> {
    let mut payload = match EventPayload::try_decode(&request.event_type, &request.payload) {
        Ok(payload) => payload,
        Err(PayloadError::UnknownType(event_type)) => EventPayload::Unknown {
            event_type,
            payload: request.payload,
        },
        Err(e @ PayloadError::Malformed { .. }) => return Err(AppError::validation(e.to_string())),
    };

    // Lines need a stable identity before they hit the log
    let mut line_key = None;
    match &mut payload {
        EventPayload::ItemAdded(added) => {
            if added.line_key.is_none() {
                added.line_key = request
                    .entity_id
                    .clone()
                    .or_else(|| Some(Uuid::new_v4().to_string()));
            }
            line_key = added.line_key.clone();
        }
        EventPayload::ItemRemoved(removed) => line_key = removed.line_key.clone(),
        _ => {}
    }

    let mut new = NewOrderEvent::new(order_id, payload)
        .source(request.source.unwrap_or(EventSource::Staff));
    new = match (request.entity_type, request.entity_id) {
        (Some(entity_type), entity_id) => new.entity(entity_type, entity_id),
        (None, Some(entity_id)) => new.entity(EntityType::Order, Some(entity_id)),
        (None, None) if line_key.is_some() => new.entity(EntityType::Item, line_key),
        (None, None) => new,
    };
    if let Some(key) = request.idempotency_key {
        new = new.idempotency_key(key);
    }
    if let Some(occurred_at) = request.occurred_at {
        new = new.occurred_at(occurred_at);
    }
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(event_type: &str, payload: Value) -> EmitEventRequest {
        EmitEventRequest {
            event_type: event_type.into(),
            payload,
            entity_type: None,
            entity_id: None,
            source: None,
            idempotency_key: None,
            occurred_at: None,
        }
    }

    #[test]
    fn test_item_added_gets_a_line_key() {
        let new = build_event(1, request("item_added", json!({ "menuitem_id": 5 }))).unwrap();
        let EventPayload::ItemAdded(added) = &new.payload else {
            panic!("expected item_added");
        };
        let key = added.line_key.clone().expect("line key assigned");
        assert!(Uuid::parse_str(&key).is_ok());
        assert_eq!(new.entity_type, EntityType::Item);
        assert_eq!(new.entity_id.as_deref(), Some(key.as_str()));
        assert_eq!(new.source, EventSource::Staff);
    }

    #[test]
    fn test_item_added_keeps_given_line_key() {
        let new = build_event(
            1,
            request("item_added", json!({ "menuitem_id": 5, "line_key": "L" })),
        )
        .unwrap();
        let EventPayload::ItemAdded(added) = &new.payload else {
            panic!("expected item_added");
        };
        assert_eq!(added.line_key.as_deref(), Some("L"));
    }

    #[test]
    fn test_unknown_type_is_passed_through() {
        let new = build_event(1, request("table_moved", json!({ "to": 3 }))).unwrap();
        assert!(new.payload.is_unknown());
        assert_eq!(new.payload.event_type(), "table_moved");
    }

    #[test]
    fn test_malformed_payload_is_rejected() {
        let result = build_event(1, request("item_added", json!({ "qty": 2 })));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
