//! 订单级互斥锁
//!
//! Keyed async mutex: callers on the same order queue behind one
//! `tokio::sync::Mutex`, callers on different orders never contend. Idle
//! entries are pruned once the map grows past a threshold.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Prune idle entries once this many orders have been locked
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Clone, Default)]
pub struct OrderLocks {
    inner: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one order
    pub async fn acquire(&self, order_id: i64) -> OwnedMutexGuard<()> {
        if self.inner.len() > PRUNE_THRESHOLD {
            self.prune();
        }
        // Clone out of the map so no shard lock is held across the await
        let mutex = self
            .inner
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub fn prune(&self) {
        self.inner.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for OrderLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLocks")
            .field("orders", &self.inner.len())
            .finish()
    }
}
