//! HTTP API 集成测试
//!
//! 通过 `tower::ServiceExt::oneshot` 直接调用路由，不启动监听端口。
//! 状态中的 webhook 队列接收端被丢弃，因此 webhook 总是同步处理。

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::*;
use http_body_util::BodyExt;
use order_server::api::build_app;
use order_server::broadcast::order_channel;
use order_server::{Config, ServerState};
use serde_json::{Value, json};
use shared::order::Station;
use tower::ServiceExt;

async fn setup_app() -> (TestDb, ServerState, Router) {
    let db = setup_db().await;
    let (state, webhook_rx) = ServerState::from_pool(Config::default(), db.pool.clone());
    drop(webhook_rx);
    let app = build_app().with_state(state.clone());
    (db, state, app)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let (_db, _state, app) = setup_app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["status"], "ok");
}

#[tokio::test]
async fn test_request_id_is_set() {
    let (_db, _state, app) = setup_app().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_open_order_and_emit_events() {
    let (db, _state, app) = setup_app().await;
    let burger = menu_item(&db.pool, "Burger", 12.5, Some(Station::Kitchen)).await;

    let (status, body) = send(&app, "POST", "/orders", Some(json!({ "public_slug": "t-12" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], "E0000");
    assert_eq!(body["data"]["status"], "opened");
    assert_eq!(body["data"]["public_slug"], "t-12");
    let order_id = body["data"]["order_id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/events"),
        Some(json!({
            "event_type": "item_added",
            "payload": { "line_key": "L1", "menu_item_id": burger, "qty": 2 },
            "source": "guest"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["sequence"], 1);
    assert_eq!(body["data"]["entity_type"], "item");
    assert_eq!(body["data"]["entity_id"], "L1");

    let (status, body) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["line_key"], "L1");
    assert_eq!(body["data"]["totals"]["nett"], 25.0);
    assert_eq!(body["data"]["last_projected_event_sequence"], 1);
}

#[tokio::test]
async fn test_open_order_without_body() {
    let (_db, _state, app) = setup_app().await;
    let (status, body) = send(&app, "POST", "/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["public_slug"].is_null());
}

#[tokio::test]
async fn test_emit_with_idempotency_key_returns_same_event() {
    let (_db, state, app) = setup_app().await;
    let order = state.orders.open_order(None).await.unwrap();
    let request = json!({
        "event_type": "bill_requested",
        "payload": {},
        "idempotency_key": "bill-1"
    });
    let uri = format!("/orders/{}/events", order.id);

    let (_, first) = send(&app, "POST", &uri, Some(request.clone())).await;
    let (_, second) = send(&app, "POST", &uri, Some(request)).await;

    assert_eq!(first["data"]["id"], second["data"]["id"]);
    assert_eq!(
        state.orders.store().events_for(order.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_emit_malformed_payload_is_rejected() {
    let (_db, state, app) = setup_app().await;
    let order = state.orders.open_order(None).await.unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{}/events", order.id),
        Some(json!({ "event_type": "status_changed", "payload": { "to": "teleported" } })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");
    assert!(state.orders.store().events_for(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_emit_unknown_type_is_kept() {
    let (_db, state, app) = setup_app().await;
    let order = state.orders.open_order(None).await.unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{}/events", order.id),
        Some(json!({ "event_type": "table_moved", "payload": { "table": 3 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["event_type"], "table_moved");

    let (_, replay) = send(&app, "GET", &format!("/orders/{}/replay", order.id), None).await;
    assert_eq!(replay["data"]["unsupported_events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_order_is_404() {
    let (_db, _state, app) = setup_app().await;

    let (status, body) = send(&app, "GET", "/orders/777", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "E0003");

    let (status, _) = send(
        &app,
        "POST",
        "/orders/777/events",
        Some(json!({ "event_type": "items_submitted" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/orders/777/replay", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replay_and_audit() {
    let (db, state, app) = setup_app().await;
    let soup = menu_item(&db.pool, "Soup", 6.0, Some(Station::Kitchen)).await;
    let order = state.orders.open_order(None).await.unwrap();
    state.orders.record(item_added(order.id, "L1", soup)).await.unwrap();
    state.orders.record(submitted(order.id)).await.unwrap();

    let (status, body) = send(&app, "GET", &format!("/orders/{}/replay", order.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"]["status"], "ordered");
    assert_eq!(body["data"]["state"]["last_sequence"], 2);
    assert_eq!(body["data"]["state"]["items"]["L1"]["status"], "ordered");

    let (status, body) = send(&app, "GET", &format!("/orders/{}/audit", order.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["in_sync"], true);
}

#[tokio::test]
async fn test_webhook_rejects_invalid_body() {
    let (_db, _state, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::post("/webhooks/stripe")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "POST", "/webhooks/stripe", Some(json!({ "type": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0006");
}

#[tokio::test]
async fn test_webhook_settles_order_and_broadcasts() {
    let (_db, state, app) = setup_app().await;
    let order = state.orders.open_order(None).await.unwrap();
    let mut updates = state.hub.subscribe(&order_channel(order.id));

    let body = stripe_body(
        "evt_http",
        "checkout.session.completed",
        json!({
            "id": "cs_http",
            "amount_total": 1800,
            "currency": "eur",
            "metadata": { "order_id": order.id.to_string() }
        }),
    );
    let (status, response) = send(&app, "POST", "/webhooks/stripe", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK, "{response}");
    assert_eq!(response["data"]["mode"], "inline");
    assert_eq!(response["data"]["emitted"], json!(["paid", "closed"]));

    let snapshot = updates.recv().await.unwrap();
    assert_eq!(snapshot.order_id, order.id);
    assert_eq!(snapshot.status, shared::order::OrderStatus::Closed);

    // 重复投递：只记账一次
    let (status, response) = send(&app, "POST", "/webhooks/stripe", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["data"]["duplicate"], true);
    assert_eq!(
        state.orders.store().count_events(order.id, "paid").await.unwrap(),
        1
    );
}
