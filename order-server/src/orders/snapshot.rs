//! Live order snapshot assembly

use shared::order::{ItemSnapshot, OrderStateSnapshot, OrderTotals, Station};
use sqlx::SqlitePool;

use super::error::StoreResult;
use crate::db::{order_items, orders};

/// Read the projected aggregate of one order; `None` if it does not exist
pub async fn load_snapshot(
    pool: &SqlitePool,
    order_id: i64,
) -> StoreResult<Option<OrderStateSnapshot>> {
    let Some(order) = orders::find(pool, order_id).await? else {
        return Ok(None);
    };
    let rows = order_items::list_for_order(pool, order_id).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(ItemSnapshot {
            id: row.id,
            status: row.status.parse()?,
            station: row.station.as_deref().map(str::parse::<Station>).transpose()?,
            line_key: row.line_key,
            menu_item_id: row.menu_item_id,
            qty: row.qty,
            price: row.price,
            station_ticket_id: row.station_ticket_id,
        });
    }

    Ok(Some(OrderStateSnapshot {
        order_id: order.id,
        status: order.status()?,
        public_slug: order.public_slug,
        items,
        totals: OrderTotals {
            nett: order.nett,
            tip: order.tip,
            service: order.service,
            tax: order.tax,
            gross: order.gross,
        },
        last_projected_event_sequence: order.last_projected_event_sequence,
        updated_at: order.updated_at,
    }))
}
