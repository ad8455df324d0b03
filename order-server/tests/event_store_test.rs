//! 事件存储集成测试
//!
//! - 并发写入同一订单：序号连续无间隙
//! - 幂等键：重复写入返回同一事件
//! - 守卫写入：paid / closed 只出现一次

mod common;

use common::*;
use order_server::orders::{
    EmitGuard, EmitOutcome, EventPayload, EventStore, NewOrderEvent, OrderEventType, OrderLocks,
    OrderStatus, StoreError,
};
use shared::order::PaymentMarker;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_emits_get_gapless_sequences() {
    let (_db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    let store = manager.store().clone();

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        let order_id = order.id;
        handles.push(tokio::spawn(async move {
            store
                .emit(item_added(order_id, &format!("line-{i}"), 1))
                .await
                .unwrap()
                .sequence
        }));
    }

    let mut sequences = Vec::new();
    for handle in handles {
        sequences.push(handle.await.unwrap());
    }
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=20).collect::<Vec<i64>>());

    let log = store.events_for(order.id).await.unwrap();
    let logged: Vec<i64> = log.iter().map(|e| e.sequence).collect();
    assert_eq!(logged, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_pools_share_one_sequence() {
    let (db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    // 两个连接池、两套进程内锁：只剩数据库层的订单锁
    let first = manager.store().clone();
    let second = EventStore::new(db.second_pool().await, OrderLocks::new());

    let mut handles = Vec::new();
    for i in 0..40 {
        let store = if i % 2 == 0 { first.clone() } else { second.clone() };
        let order_id = order.id;
        handles.push(tokio::spawn(async move {
            store
                .emit(item_added(order_id, &format!("line-{i}"), 1))
                .await
                .unwrap()
                .sequence
        }));
    }

    let mut sequences = Vec::new();
    for handle in handles {
        sequences.push(handle.await.unwrap());
    }
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=40).collect::<Vec<i64>>());

    let logged: Vec<i64> = second
        .events_for(order.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(logged, (1..=40).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_sequences_are_per_order() {
    let (_db, manager) = setup_manager().await;
    let a = manager.open_order(None).await.unwrap();
    let b = manager.open_order(None).await.unwrap();
    let store = manager.store();

    store.emit(submitted(a.id)).await.unwrap();
    store.emit(submitted(a.id)).await.unwrap();
    let first_b = store.emit(submitted(b.id)).await.unwrap();

    assert_eq!(first_b.sequence, 1);
    assert_eq!(store.events_for(a.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_idempotency_key_returns_existing_event() {
    let (_db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    let store = manager.store();

    let first = store
        .emit(status(order.id, None, OrderStatus::Ordered).idempotency_key("tap-1"))
        .await
        .unwrap();
    let second = store
        .emit(status(order.id, None, OrderStatus::Preparing).idempotency_key("tap-1"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.sequence, second.sequence);
    assert_eq!(store.events_for(order.id).await.unwrap().len(), 1);
    // 先写入的负载保留
    assert_eq!(
        second.payload,
        EventPayload::StatusChanged(shared::order::StatusChanged {
            from: None,
            to: OrderStatus::Ordered,
        })
    );

    let found = store
        .find_by_idempotency_key(order.id, "tap-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_yields_one_row() {
    let (_db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    let store = manager.store().clone();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let order_id = order.id;
        handles.push(tokio::spawn(async move {
            store
                .emit(submitted(order_id).idempotency_key("submit-once"))
                .await
                .unwrap()
                .id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(
        store.count_events(order.id, "items_submitted").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_emit_for_missing_order_fails() {
    let (_db, manager) = setup_manager().await;
    let err = manager.store().emit(submitted(999)).await.unwrap_err();
    assert!(matches!(err, StoreError::OrderNotFound(999)));
}

#[tokio::test]
async fn test_unknown_event_type_is_stored_verbatim() {
    let (_db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    let payload = EventPayload::Unknown {
        event_type: "table_moved".into(),
        payload: serde_json::json!({ "table": 7 }),
    };

    let event = manager
        .store()
        .emit(NewOrderEvent::new(order.id, payload.clone()))
        .await
        .unwrap();
    assert_eq!(event.event_type, "table_moved");
    assert_eq!(event.known_type(), None);

    let log = manager.store().events_for(order.id).await.unwrap();
    assert_eq!(log[0].payload, payload);
}

#[tokio::test]
async fn test_guarded_emits() {
    let (db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    let store = manager.store();
    let paid = || {
        NewOrderEvent::new(order.id, EventPayload::Paid(PaymentMarker::default()))
    };
    let closed = || {
        NewOrderEvent::new(order.id, EventPayload::Closed(PaymentMarker::default()))
    };

    // closed 需要先有 paid
    let outcome = store
        .emit_guarded(closed(), EmitGuard::FirstOfTypeAfter(OrderEventType::Paid))
        .await
        .unwrap();
    assert_eq!(outcome, EmitOutcome::Skipped);

    // 未结清的分账阻止 paid
    split(&db.pool, order.id, 1000).await;
    let outcome = store
        .emit_guarded(paid(), EmitGuard::FirstOfTypeWhenSettled)
        .await
        .unwrap();
    assert_eq!(outcome, EmitOutcome::Skipped);

    let outcome = store
        .emit_guarded(paid(), EmitGuard::FirstOfType)
        .await
        .unwrap();
    assert!(outcome.is_appended());
    let again = store
        .emit_guarded(paid(), EmitGuard::FirstOfType)
        .await
        .unwrap();
    assert_eq!(again, EmitOutcome::Skipped);

    let outcome = store
        .emit_guarded(closed(), EmitGuard::FirstOfTypeAfter(OrderEventType::Paid))
        .await
        .unwrap();
    assert!(outcome.is_appended());

    assert!(store.has_event(order.id, OrderEventType::Closed).await.unwrap());
    assert_eq!(store.events_for(order.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_guard_does_not_consume_sequence() {
    let (_db, manager) = setup_manager().await;
    let order = manager.open_order(None).await.unwrap();
    let store = manager.store();

    let skipped = store
        .emit_guarded(
            NewOrderEvent::new(order.id, EventPayload::Closed(PaymentMarker::default())),
            EmitGuard::FirstOfTypeAfter(OrderEventType::Paid),
        )
        .await
        .unwrap();
    assert_eq!(skipped, EmitOutcome::Skipped);

    let next = store.emit(submitted(order.id)).await.unwrap();
    assert_eq!(next.sequence, 1);
}
