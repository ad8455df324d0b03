//! OrdersManager - entry point for order writes and reads
//!
//! ```text
//! record(new)
//!     ├─ 1. EventStore::emit        (sequence + idempotency)
//!     ├─ 2. Projector::project      (one transaction, cursor advanced)
//!     └─ 3. PostCommitHooks::run    (best effort)
//! ```

use shared::now_millis;
use shared::order::{OrderEvent, OrderStateSnapshot};
use sqlx::SqlitePool;

use super::audit::{AuditReport, compare};
use super::error::{StoreError, StoreResult};
use super::event_store::{EventStore, NewOrderEvent};
use super::hooks::PostCommitHooks;
use super::locks::OrderLocks;
use super::projector::{ProjectionOutcome, Projector};
use super::reducer::{Reduction, reduce};
use super::snapshot::load_snapshot;
use crate::db::orders::{self, CreateOrder, OrderRow};

#[derive(Clone)]
pub struct OrdersManager {
    pool: SqlitePool,
    store: EventStore,
    projector: Projector,
    locks: OrderLocks,
    hooks: PostCommitHooks,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("locks", &self.locks)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl OrdersManager {
    /// Store and projector share one lock table
    pub fn new(pool: SqlitePool) -> Self {
        let locks = OrderLocks::new();
        Self {
            store: EventStore::new(pool.clone(), locks.clone()),
            projector: Projector::new(pool.clone(), locks.clone()),
            locks,
            hooks: PostCommitHooks::new(),
            pool,
        }
    }

    pub fn with_hooks(mut self, hooks: PostCommitHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create an order aggregate in `opened` status
    pub async fn open_order(&self, public_slug: Option<&str>) -> StoreResult<OrderRow> {
        let order = orders::create(
            &self.pool,
            &CreateOrder {
                public_slug,
                tip: 0.0,
                service: 0.0,
                tax: 0.0,
                now: now_millis(),
            },
        )
        .await?;
        tracing::info!(order_id = order.id, "Order opened");
        Ok(order)
    }

    /// Emit, project, then run post-commit hooks
    pub async fn record(&self, new: NewOrderEvent) -> StoreResult<OrderEvent> {
        let event = self.store.emit(new).await?;
        self.project_and_notify(event.order_id).await?;
        Ok(event)
    }

    pub async fn project_and_notify(&self, order_id: i64) -> StoreResult<ProjectionOutcome> {
        let outcome = self.projector.project(order_id).await?;
        self.hooks.run(&outcome).await;
        Ok(outcome)
    }

    pub async fn snapshot(&self, order_id: i64) -> StoreResult<Option<OrderStateSnapshot>> {
        load_snapshot(&self.pool, order_id).await
    }

    /// Reduce the order's full log
    pub async fn replay(&self, order_id: i64) -> StoreResult<Reduction> {
        if !orders::exists(&self.pool, order_id).await? {
            return Err(StoreError::OrderNotFound(order_id));
        }
        let events = self.store.events_for(order_id).await?;
        Ok(reduce(&events))
    }

    /// Replay the log and compare it with the live aggregate
    pub async fn audit(&self, order_id: i64) -> StoreResult<AuditReport> {
        let reduction = self.replay(order_id).await?;
        let snapshot = self
            .snapshot(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let report = compare(&reduction, &snapshot);
        if !report.in_sync {
            tracing::warn!(
                order_id,
                missing = report.missing_items.len(),
                unexpected = report.unexpected_items.len(),
                log_sequence = report.log_sequence,
                projected_sequence = report.projected_sequence,
                "Projection drift detected"
            );
        }
        Ok(report)
    }
}
