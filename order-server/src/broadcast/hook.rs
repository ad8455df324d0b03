use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use super::Broadcaster;
use crate::orders::hooks::{HookError, PostCommitHook};
use crate::orders::projector::ProjectionOutcome;
use crate::orders::snapshot::load_snapshot;

/// Publishes the freshly projected snapshot after every projection
pub struct BroadcastHook {
    pool: SqlitePool,
    broadcaster: Arc<dyn Broadcaster>,
}

impl BroadcastHook {
    pub fn new(pool: SqlitePool, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self { pool, broadcaster }
    }
}

#[async_trait]
impl PostCommitHook for BroadcastHook {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    async fn after_projection(&self, outcome: &ProjectionOutcome) -> Result<(), HookError> {
        if let Some(snapshot) = load_snapshot(&self.pool, outcome.order_id).await? {
            self.broadcaster.publish(snapshot);
        }
        Ok(())
    }
}
