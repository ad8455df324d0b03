//! LiveOrderHub - 订单状态实时推送
//!
//! Fan-out of projected order snapshots to subscribers (guest screens,
//! kitchen displays). Publishing is fire-and-forget: no subscribers, lagging
//! subscribers, or a dropped channel never reach the caller.
//!
//! ```text
//! Projector commit
//!       │ BroadcastHook
//!       ▼
//! LiveOrderHub
//!   ├── "order:{id}"    → staff / kitchen views
//!   └── "slug:{slug}"   → public guest view (when the order has a slug)
//! ```

mod hook;

pub use hook::BroadcastHook;

use dashmap::DashMap;
use shared::order::OrderStateSnapshot;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Broadcast channel 容量，足以缓冲连接时突发
const BROADCAST_CAPACITY: usize = 256;

/// Snapshot publisher seam
pub trait Broadcaster: Send + Sync {
    /// Best effort; must not fail or block
    fn publish(&self, snapshot: OrderStateSnapshot);
}

pub fn order_channel(order_id: i64) -> String {
    format!("order:{order_id}")
}

pub fn slug_channel(slug: &str) -> String {
    format!("slug:{slug}")
}

/// In-process hub: one broadcast channel per channel name
#[derive(Clone, Default)]
pub struct LiveOrderHub {
    channels: Arc<DashMap<String, broadcast::Sender<Arc<OrderStateSnapshot>>>>,
}

impl LiveOrderHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<Arc<OrderStateSnapshot>> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .subscribe()
    }

    /// Drop channels whose subscribers have all gone away
    pub fn prune(&self) {
        self.channels.retain(|_, tx| tx.receiver_count() > 0);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn send(&self, channel: &str, snapshot: &Arc<OrderStateSnapshot>) {
        if let Some(tx) = self.channels.get(channel) {
            // 无订阅者时 send 返回 Err，安全忽略
            let _ = tx.send(snapshot.clone());
        }
    }
}

impl Broadcaster for LiveOrderHub {
    fn publish(&self, snapshot: OrderStateSnapshot) {
        let snapshot = Arc::new(snapshot);
        self.send(&order_channel(snapshot.order_id), &snapshot);
        if let Some(slug) = snapshot.public_slug.as_deref() {
            self.send(&slug_channel(slug), &snapshot);
        }
        tracing::debug!(
            order_id = snapshot.order_id,
            status = %snapshot.status,
            "Order snapshot published"
        );
    }
}

impl std::fmt::Debug for LiveOrderHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveOrderHub")
            .field("channels", &self.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderStatus, OrderTotals};

    fn snapshot(order_id: i64, slug: Option<&str>) -> OrderStateSnapshot {
        OrderStateSnapshot {
            order_id,
            status: OrderStatus::Ordered,
            public_slug: slug.map(str::to_string),
            items: vec![],
            totals: OrderTotals::default(),
            last_projected_event_sequence: 1,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_order_and_slug_channels() {
        let hub = LiveOrderHub::new();
        let mut by_order = hub.subscribe(&order_channel(7));
        let mut by_slug = hub.subscribe(&slug_channel("table-7"));

        hub.publish(snapshot(7, Some("table-7")));

        assert_eq!(by_order.recv().await.unwrap().order_id, 7);
        assert_eq!(by_slug.recv().await.unwrap().order_id, 7);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let hub = LiveOrderHub::new();
        hub.publish(snapshot(1, Some("nobody")));
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_prune_drops_abandoned_channels() {
        let hub = LiveOrderHub::new();
        let rx = hub.subscribe(&order_channel(1));
        let _kept = hub.subscribe(&order_channel(2));
        drop(rx);

        hub.prune();
        assert_eq!(hub.channel_count(), 1);
    }
}
