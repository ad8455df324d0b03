//! Shared fixtures for integration tests: a migrated SQLite file in a
//! temporary directory plus event / webhook builders.

#![allow(dead_code)]

use order_server::db::DbService;
use order_server::db::menu_items::{self, CreateMenuItem};
use order_server::db::split_payments;
use order_server::orders::{NewOrderEvent, OrdersManager};
use serde_json::{Value, json};
use shared::now_millis;
use shared::order::{
    EntityType, EventPayload, EventSource, ItemAdded, ItemRemoved, OrderStatus, Station,
    StatusChanged,
};
use shared::payment::ProviderEvent;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Keeps the temporary directory alive as long as the pool
pub struct TestDb {
    pub pool: SqlitePool,
    path: String,
    _dir: TempDir,
}

impl TestDb {
    /// Independent pool on the same database file (another process, in effect)
    pub async fn second_pool(&self) -> SqlitePool {
        DbService::new(&self.path).await.expect("reopen database").pool
    }
}

pub async fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir
        .path()
        .join("orders.db")
        .to_str()
        .expect("utf-8 path")
        .to_string();
    let db = DbService::new(&path).await.expect("open database");
    TestDb {
        pool: db.pool,
        path,
        _dir: dir,
    }
}

pub async fn setup_manager() -> (TestDb, OrdersManager) {
    let db = setup_db().await;
    let manager = OrdersManager::new(db.pool.clone());
    (db, manager)
}

pub async fn menu_item(pool: &SqlitePool, name: &str, price: f64, station: Option<Station>) -> i64 {
    menu_items::create(
        pool,
        &CreateMenuItem {
            name,
            price,
            station,
            now: now_millis(),
        },
    )
    .await
    .expect("create menu item")
    .id
}

pub async fn split(pool: &SqlitePool, order_id: i64, amount_cents: i64) -> i64 {
    split_payments::create(pool, order_id, amount_cents, "EUR", now_millis())
        .await
        .expect("create split payment")
        .id
}

// ========== Event builders ==========

pub fn status(order_id: i64, from: Option<OrderStatus>, to: OrderStatus) -> NewOrderEvent {
    NewOrderEvent::new(order_id, EventPayload::StatusChanged(StatusChanged { from, to }))
        .source(EventSource::Staff)
}

pub fn item_added(order_id: i64, line_key: &str, menu_item_id: i64) -> NewOrderEvent {
    NewOrderEvent::new(
        order_id,
        EventPayload::ItemAdded(ItemAdded {
            line_key: Some(line_key.into()),
            menu_item_id,
            qty: 1,
            price: None,
        }),
    )
    .entity(EntityType::Item, Some(line_key.into()))
    .source(EventSource::Guest)
}

pub fn item_removed(order_id: i64, line_key: &str) -> NewOrderEvent {
    NewOrderEvent::new(
        order_id,
        EventPayload::ItemRemoved(ItemRemoved {
            line_key: Some(line_key.into()),
            item_id: None,
        }),
    )
    .entity(EntityType::Item, Some(line_key.into()))
    .source(EventSource::Staff)
}

pub fn submitted(order_id: i64) -> NewOrderEvent {
    NewOrderEvent::new(order_id, EventPayload::ItemsSubmitted(Default::default()))
        .source(EventSource::Staff)
}

// ========== Webhook builders ==========

pub fn stripe_body(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": 1_700_000_000,
        "data": { "object": object }
    })
}

pub fn stripe_event(id: &str, event_type: &str, object: Value) -> ProviderEvent {
    ProviderEvent::from_stripe_value(stripe_body(id, event_type, object)).expect("valid event")
}

/// `checkout.session.completed` for an order, optionally for one split share
pub fn checkout_completed(id: &str, order_id: i64, split_payment_id: Option<i64>) -> ProviderEvent {
    let mut metadata = json!({ "order_id": order_id.to_string() });
    if let Some(split_id) = split_payment_id {
        metadata["ordr_split_payment_id"] = json!(split_id.to_string());
    }
    stripe_event(
        id,
        "checkout.session.completed",
        json!({
            "id": format!("cs_{id}"),
            "payment_intent": format!("pi_{id}"),
            "amount_total": 2500,
            "currency": "eur",
            "metadata": metadata
        }),
    )
}
