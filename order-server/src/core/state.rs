//! 服务器状态
//!
//! `ServerState` 持有所有服务的共享引用，`Clone` 为浅拷贝。
//!
//! | 字段 | 说明 |
//! |------|------|
//! | config | 配置项 (不可变) |
//! | pool | SQLite 连接池 |
//! | orders | 事件存储 + 投影 + 提交后钩子 |
//! | ingestor | Webhook 入账流水线 |
//! | dispatcher | 入队优先，失败时同步处理 |
//! | hub | 订单快照实时推送 |

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::config::Config;
use super::tasks::{BackgroundTasks, TaskKind};
use crate::broadcast::{BroadcastHook, LiveOrderHub};
use crate::db::DbService;
use crate::jobs::{WebhookDispatcher, WebhookJob, WebhookQueue, WebhookWorker};
use crate::orders::{OrdersManager, PostCommitHooks};
use crate::payments::WebhookIngestor;
use crate::utils::AppError;

/// 锁表与推送频道的清理周期
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub pool: SqlitePool,
    pub orders: OrdersManager,
    pub ingestor: WebhookIngestor,
    pub dispatcher: WebhookDispatcher,
    pub hub: LiveOrderHub,
}

impl ServerState {
    /// Open the database and wire every service.
    /// The receiver feeds [`ServerState::start_background_tasks`].
    pub async fn initialize(
        config: &Config,
    ) -> Result<(Self, mpsc::Receiver<WebhookJob>), AppError> {
        let db = DbService::new(&config.database_path).await?;
        Ok(Self::from_pool(config.clone(), db.pool))
    }

    /// Wire services over an existing pool
    pub fn from_pool(config: Config, pool: SqlitePool) -> (Self, mpsc::Receiver<WebhookJob>) {
        let hub = LiveOrderHub::new();
        let hooks = PostCommitHooks::new().with(Arc::new(BroadcastHook::new(
            pool.clone(),
            Arc::new(hub.clone()),
        )));
        let orders = OrdersManager::new(pool.clone()).with_hooks(hooks);
        let ingestor = WebhookIngestor::new(orders.clone());
        let (queue, webhook_rx) = WebhookQueue::new(config.webhook_queue_capacity);
        let dispatcher = WebhookDispatcher::new(Arc::new(queue), ingestor.clone());

        let state = Self {
            config,
            pool,
            orders,
            ingestor,
            dispatcher,
            hub,
        };
        (state, webhook_rx)
    }

    /// Webhook worker + periodic cleanup
    pub fn start_background_tasks(
        &self,
        webhook_rx: mpsc::Receiver<WebhookJob>,
    ) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        let worker = WebhookWorker::new(
            self.ingestor.clone(),
            self.config.webhook_workers,
            tasks.shutdown_token(),
        );
        tasks.spawn("webhook_worker", TaskKind::Worker, worker.run(webhook_rx));

        let locks = self.orders.locks().clone();
        let hub = self.hub.clone();
        let shutdown = tasks.shutdown_token();
        tasks.spawn("registry_prune", TaskKind::Periodic, async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        locks.prune();
                        hub.prune();
                        tracing::debug!(
                            order_locks = locks.len(),
                            channels = hub.channel_count(),
                            "Registries pruned"
                        );
                    }
                }
            }
        });

        tasks
    }
}
