//! Projector - applies new events to the live aggregate
//!
//! Reads events after the order's `last_projected_event_sequence`, applies
//! each one to `orders` / `order_items` / `order_station_tickets`, recomputes
//! totals, and advances the cursor, all in ONE transaction. A crash before
//! commit leaves both the tables and the cursor untouched, so the next run
//! re-applies the same events from the same starting point.
//!
//! Events that cannot be applied (unknown type, unknown menu item, missing
//! line) are skipped with a log line; the cursor still moves past them.

use shared::now_millis;
use shared::order::{
    EventPayload, ItemAdded, ItemRemoved, ItemStatus, OrderEvent, OrderStatus, Station,
};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::error::{StoreError, StoreResult};
use super::event_store::{fetch_after, has_events_after};
use super::locks::OrderLocks;
use super::money::{line_total, to_decimal, to_f64};
use crate::db::{menu_items, order_items, orders, station_tickets};

/// What one projection run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ProjectionOutcome {
    pub order_id: i64,
    pub applied: usize,
    pub skipped: usize,
    /// Cursor after the run
    pub cursor: i64,
}

impl ProjectionOutcome {
    fn idle(order_id: i64, cursor: i64) -> Self {
        Self {
            order_id,
            applied: 0,
            skipped: 0,
            cursor,
        }
    }

    /// Nothing new was found
    pub fn is_idle(&self) -> bool {
        self.applied == 0 && self.skipped == 0
    }
}

enum Step {
    Applied,
    Skipped(&'static str),
}

/// Per-run context threaded through the apply functions
struct Apply<'a> {
    conn: &'a mut SqliteConnection,
    order_id: i64,
    status: OrderStatus,
    now: i64,
}

#[derive(Clone)]
pub struct Projector {
    pool: SqlitePool,
    locks: OrderLocks,
}

impl Projector {
    pub fn new(pool: SqlitePool, locks: OrderLocks) -> Self {
        Self { pool, locks }
    }

    /// Bring the order's live aggregate up to date with its log
    pub async fn project(&self, order_id: i64) -> StoreResult<ProjectionOutcome> {
        let _guard = self.locks.acquire(order_id).await;

        let Some(order) = orders::find(&self.pool, order_id).await? else {
            debug!(order_id, "Projection skipped: order not found");
            return Ok(ProjectionOutcome::idle(order_id, 0));
        };
        let cursor = order.last_projected_event_sequence;
        // Nothing new: no transaction, no writes
        if !has_events_after(&self.pool, order_id, cursor).await? {
            return Ok(ProjectionOutcome::idle(order_id, cursor));
        }

        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        // First statement writes the order row: the transaction owns the db lock from here on
        if !orders::touch(&mut *tx, order_id, now).await? {
            return Err(StoreError::OrderNotFound(order_id));
        }
        let order = orders::find(&mut *tx, order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let events = fetch_after(&mut *tx, order_id, order.last_projected_event_sequence).await?;

        let mut outcome = ProjectionOutcome::idle(order_id, order.last_projected_event_sequence);
        let mut apply = Apply {
            conn: &mut tx,
            order_id,
            status: order.status()?,
            now,
        };
        for event in &events {
            match apply.event(event).await? {
                Step::Applied => outcome.applied += 1,
                Step::Skipped(reason) => {
                    outcome.skipped += 1;
                    debug!(
                        order_id,
                        sequence = event.sequence,
                        event_type = %event.event_type,
                        reason,
                        "Event skipped by projector"
                    );
                }
            }
            outcome.cursor = event.sequence;
        }
        apply.recompute_totals(order.tip, order.service, order.tax).await?;

        orders::advance_cursor(&mut *tx, order_id, outcome.cursor, now).await?;
        tx.commit().await?;

        info!(
            order_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            cursor = outcome.cursor,
            "Order projected"
        );
        Ok(outcome)
    }
}

impl Apply<'_> {
    async fn event(&mut self, event: &OrderEvent) -> StoreResult<Step> {
        let at = event.occurred_at;
        match &event.payload {
            EventPayload::StatusChanged(change) => self.change_status(change.to, at).await,
            EventPayload::BillRequested(_) => self.advance_to(OrderStatus::BillRequested, at).await,
            EventPayload::Paid(_) => self.advance_to(OrderStatus::Paid, at).await,
            EventPayload::Closed(_) => self.advance_to(OrderStatus::Closed, at).await,
            EventPayload::ItemAdded(added) => self.add_item(event, added).await,
            EventPayload::ItemRemoved(removed) => self.remove_item(event, removed).await,
            EventPayload::ItemsSubmitted(_) => self.submit_items(at).await,
            EventPayload::Unknown { event_type, .. } => {
                warn!(
                    order_id = self.order_id,
                    sequence = event.sequence,
                    event_type = %event_type,
                    "Unsupported event type, skipping"
                );
                Ok(Step::Skipped("unsupported event type"))
            }
        }
    }

    /// Status transition: stamp, cascade to lines, clear tickets when leaving prep
    async fn change_status(&mut self, to: OrderStatus, at: i64) -> StoreResult<Step> {
        if self.status == to {
            return Ok(Step::Skipped("status unchanged"));
        }
        if self.status.is_terminal() {
            warn!(order_id = self.order_id, to = %to, "Order is closed, ignoring status change");
            return Ok(Step::Skipped("order is closed"));
        }

        orders::set_status(&mut *self.conn, self.order_id, to, at, self.now).await?;
        order_items::cascade_status(&mut *self.conn, self.order_id, to, self.now).await?;
        if to.clears_station_tickets() {
            self.clear_station_tickets().await?;
        }
        self.status = to;
        Ok(Step::Applied)
    }

    /// Markers only move an order forward
    async fn advance_to(&mut self, target: OrderStatus, at: i64) -> StoreResult<Step> {
        if self.status >= target {
            return Ok(Step::Skipped("already at or past target status"));
        }
        self.change_status(target, at).await
    }

    /// Detach lines first, then delete: the FK from order_items forbids the reverse
    async fn clear_station_tickets(&mut self) -> StoreResult<()> {
        let detached = order_items::detach_tickets(&mut *self.conn, self.order_id, self.now).await?;
        let deleted = station_tickets::delete_for_order(&mut *self.conn, self.order_id).await?;
        if deleted > 0 {
            debug!(order_id = self.order_id, detached, deleted, "Station tickets cleared");
        }
        Ok(())
    }

    async fn add_item(&mut self, event: &OrderEvent, added: &ItemAdded) -> StoreResult<Step> {
        let Some(line_key) = added.line_key.as_deref().or(event.entity_id.as_deref()) else {
            warn!(order_id = self.order_id, sequence = event.sequence, "item_added without line key");
            return Ok(Step::Skipped("missing line key"));
        };
        if order_items::line_exists(&mut *self.conn, self.order_id, line_key).await? {
            return Ok(Step::Skipped("line already projected"));
        }
        let Some(menu_item) = menu_items::find(&mut *self.conn, added.menu_item_id).await? else {
            warn!(
                order_id = self.order_id,
                sequence = event.sequence,
                menu_item_id = added.menu_item_id,
                "Unknown menu item, skipping item_added"
            );
            return Ok(Step::Skipped("unknown menu item"));
        };

        order_items::insert_if_absent(
            &mut *self.conn,
            &order_items::CreateOrderItem {
                order_id: self.order_id,
                line_key,
                menu_item_id: menu_item.id,
                qty: added.qty,
                price: added.price.unwrap_or(menu_item.price),
                status: ItemStatus::Opened,
                now: self.now,
            },
        )
        .await?;
        Ok(Step::Applied)
    }

    /// Match by line key first, then by row id
    async fn remove_item(&mut self, event: &OrderEvent, removed: &ItemRemoved) -> StoreResult<Step> {
        let entity_id = event.entity_id.as_deref();

        if let Some(line_key) = removed.line_key.as_deref().or(entity_id)
            && order_items::mark_removed_by_line_key(&mut *self.conn, self.order_id, line_key, self.now)
                .await?
                > 0
        {
            return Ok(Step::Applied);
        }

        let item_id = removed
            .item_id
            .or_else(|| entity_id.and_then(|id| id.parse().ok()));
        if let Some(item_id) = item_id
            && order_items::mark_removed_by_id(&mut *self.conn, self.order_id, item_id, self.now)
                .await?
                > 0
        {
            return Ok(Step::Applied);
        }

        warn!(order_id = self.order_id, sequence = event.sequence, "item_removed matched no line");
        Ok(Step::Skipped("line not found"))
    }

    /// Route opened, unticketed lines onto one new ticket per station
    async fn submit_items(&mut self, at: i64) -> StoreResult<Step> {
        let pending = order_items::pending_submission(&mut *self.conn, self.order_id).await?;
        if pending.is_empty() {
            return Ok(Step::Skipped("nothing to submit"));
        }

        // Past prep there is nothing to route: lines are submitted without tickets
        let route = !self.status.clears_station_tickets();
        if !route {
            debug!(order_id = self.order_id, status = %self.status, "Submission past prep, no station tickets");
        }

        let mut by_station: BTreeMap<Option<Station>, Vec<i64>> = BTreeMap::new();
        for (item_id, station) in pending {
            let station = station.map(|s| s.parse::<Station>()).transpose()?;
            by_station.entry(station.filter(|_| route)).or_default().push(item_id);
        }

        for (station, item_ids) in by_station {
            let ticket_id = match station {
                Some(station) => {
                    let sequence =
                        station_tickets::next_sequence(&mut *self.conn, self.order_id, station).await?;
                    let id = station_tickets::create(
                        &mut *self.conn,
                        self.order_id,
                        station,
                        sequence,
                        self.now,
                    )
                    .await?;
                    debug!(order_id = self.order_id, station = %station, ticket_id = id, lines = item_ids.len(), "Station ticket created");
                    Some(id)
                }
                None => None,
            };
            for item_id in item_ids {
                order_items::submit(&mut *self.conn, item_id, ticket_id, self.now).await?;
            }
        }

        if self.status == OrderStatus::Opened {
            self.change_status(OrderStatus::Ordered, at).await?;
        }
        Ok(Step::Applied)
    }

    async fn recompute_totals(&mut self, tip: f64, service: f64, tax: f64) -> StoreResult<()> {
        let lines = order_items::billable_lines(&mut *self.conn, self.order_id).await?;
        let nett = line_total(&lines);
        let gross = nett + to_decimal(tip) + to_decimal(service) + to_decimal(tax);
        orders::set_totals(&mut *self.conn, self.order_id, to_f64(nett), to_f64(gross), self.now)
            .await?;
        Ok(())
    }
}
