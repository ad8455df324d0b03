//! Webhook queue - bounded channel + concurrent worker
//! Webhook 异步处理队列
//!
//! HTTP 处理器先把事件写入 `webhook_jobs`，再入队；`WebhookWorker` 在后台并发消费。
//! 入队失败（队列满/已关闭）由 [`super::WebhookDispatcher`] 回退为同步处理。
//!
//! 通道只是加速路径，持久化的任务表才是事实来源：
//! - 启动时恢复死信并处理遗留的 pending 任务
//! - 定时扫描失败任务，指数退避重试，超过上限移入死信
//! - 关闭时停止接收并等待处理中的任务完成，通道中剩余任务留待下次启动

use dashmap::DashSet;
use shared::now_millis;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::{EnqueueError, JobEnqueuer, WebhookJob, run_job};
use crate::db::webhook_jobs::{self, WebhookJobRow};
use crate::payments::WebhookIngestor;

/// Retry configuration
const MAX_RETRY_COUNT: i64 = 5;
const RETRY_BASE_DELAY_SECS: u64 = 5;
const RETRY_MAX_DELAY_SECS: u64 = 60;
const QUEUE_SCAN_INTERVAL_SECS: u64 = 30;
/// Untried jobs younger than this are assumed to still sit in the channel
const STALE_AFTER_SECS: u64 = 60;

/// Producer side of the queue
#[derive(Debug, Clone)]
pub struct WebhookQueue {
    tx: mpsc::Sender<WebhookJob>,
}

impl WebhookQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WebhookJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl JobEnqueuer for WebhookQueue {
    fn enqueue(&self, job: WebhookJob) -> Result<(), EnqueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(job) => EnqueueError::Full(job),
            mpsc::error::TrySendError::Closed(job) => EnqueueError::Closed(job),
        })
    }
}

/// Delay before the next attempt after `retry_count` failures:
/// base * 2^(retry_count-1), capped
fn backoff(retry_count: i64) -> Duration {
    let exponent = u32::try_from(retry_count.saturating_sub(1).max(0)).unwrap_or(u32::MAX);
    let factor = 2u64.saturating_pow(exponent);
    Duration::from_secs(RETRY_BASE_DELAY_SECS.saturating_mul(factor).min(RETRY_MAX_DELAY_SECS))
}

/// Whether a pending row is due for a rescan attempt
fn is_due(job: &WebhookJobRow, now: i64) -> bool {
    let wait = if job.retry_count == 0 {
        Duration::from_secs(STALE_AFTER_SECS)
    } else {
        backoff(job.retry_count)
    };
    now >= job.updated_at.saturating_add(wait.as_millis() as i64)
}

/// Consumer side (支持并发处理)
pub struct WebhookWorker {
    ingestor: WebhookIngestor,
    pool: SqlitePool,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    /// Job ids currently being ingested (channel or rescan)
    running: Arc<DashSet<i64>>,
    shutdown: CancellationToken,
}

impl WebhookWorker {
    pub fn new(ingestor: WebhookIngestor, concurrency: usize, shutdown: CancellationToken) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            pool: ingestor.pool().clone(),
            ingestor,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            running: Arc::new(DashSet::new()),
            shutdown,
        }
    }

    /// Recover persisted work, then drain the channel until shutdown
    pub async fn run(self, mut rx: mpsc::Receiver<WebhookJob>) {
        tracing::info!(concurrency = self.concurrency, "WebhookWorker started");

        match webhook_jobs::recover_dead_letters(&self.pool, now_millis()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Recovered dead letter webhook jobs"),
            Err(e) => tracing::error!(error = %e, "Failed to recover dead letter webhook jobs"),
        }
        // 上次运行遗留的任务
        self.process_pending_queue(true).await;

        let period = Duration::from_secs(QUEUE_SCAN_INTERVAL_SECS);
        let mut scan_interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("WebhookWorker received shutdown signal");
                    break;
                }
                job = rx.recv() => {
                    let Some(job) = job else {
                        tracing::info!("Webhook channel closed, shutting down WebhookWorker");
                        break;
                    };
                    // 并发上限：等待空闲许可
                    let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                        break;
                    };
                    if !self.running.insert(job.id) {
                        continue;
                    }
                    let ingestor = self.ingestor.clone();
                    let pool = self.pool.clone();
                    let running = self.running.clone();
                    in_flight.spawn(async move {
                        let _permit = permit;
                        if let Ok(report) = run_job(&ingestor, &pool, &job, false).await {
                            tracing::debug!(
                                job_id = job.id,
                                provider_event_id = %job.event.provider_event_id,
                                duplicate = report.duplicate,
                                "Queued webhook processed"
                            );
                        }
                        running.remove(&job.id);
                    });
                }
                _ = scan_interval.tick() => {
                    self.process_pending_queue(false).await;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = ?e, "Webhook job task panicked");
                    }
                }
            }
        }

        // 停止接收；通道内剩余任务已持久化，下次启动时处理
        rx.close();
        let mut left = 0usize;
        while rx.try_recv().is_ok() {
            left += 1;
        }
        if left > 0 {
            tracing::info!(count = left, "Queued webhook jobs left pending for next start");
        }

        tracing::info!(count = in_flight.len(), "Waiting for in-flight webhook jobs");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = ?e, "Webhook job task panicked");
            }
        }
        tracing::info!("WebhookWorker stopped");
    }

    /// Process every pending job that is due, one after another.
    /// `all_due` ignores backoff (startup, when the channel is empty).
    /// Returns the number of jobs that succeeded.
    pub async fn process_pending_queue(&self, all_due: bool) -> usize {
        let pending = match webhook_jobs::list_pending(&self.pool).await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list pending webhook jobs");
                return 0;
            }
        };
        if pending.is_empty() {
            return 0;
        }
        tracing::debug!(count = pending.len(), "Scanning pending webhook jobs");

        let mut succeeded = 0;
        for row in pending {
            if !self.should_retry(&row, all_due).await {
                continue;
            }
            let event = match row.event() {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(job_id = row.id, error = %e, "Unreadable webhook job, moving to dead letter");
                    let _ = webhook_jobs::move_to_dead_letter(&self.pool, row.id, now_millis()).await;
                    continue;
                }
            };
            if !self.running.insert(row.id) {
                continue;
            }
            let job = WebhookJob { id: row.id, event };
            if run_job(&self.ingestor, &self.pool, &job, row.ledger_committed).await.is_ok() {
                succeeded += 1;
            }
            self.running.remove(&row.id);
        }
        succeeded
    }

    /// Dead-letter exhausted jobs; otherwise honour the backoff
    async fn should_retry(&self, row: &WebhookJobRow, all_due: bool) -> bool {
        if row.retry_count >= MAX_RETRY_COUNT {
            tracing::error!(
                job_id = row.id,
                provider_event_id = %row.provider_event_id,
                retry_count = row.retry_count,
                last_error = ?row.last_error,
                "Max retry count exceeded, moving to dead letter queue"
            );
            if let Err(e) = webhook_jobs::move_to_dead_letter(&self.pool, row.id, now_millis()).await {
                tracing::error!(job_id = row.id, error = %e, "Failed to move webhook job to dead letter");
            }
            return false;
        }
        all_due || is_due(row, now_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::payment::ProviderEvent;

    fn job(id: i64, provider_event_id: &str) -> WebhookJob {
        WebhookJob {
            id,
            event: ProviderEvent::from_stripe_value(json!({ "id": provider_event_id, "type": "invoice.paid" }))
                .expect("valid event"),
        }
    }

    fn row(retry_count: i64, updated_at: i64) -> WebhookJobRow {
        WebhookJobRow {
            id: 1,
            provider: "stripe".into(),
            provider_event_id: "evt_1".into(),
            event: "{}".into(),
            status: webhook_jobs::STATUS_PENDING.into(),
            retry_count,
            ledger_committed: false,
            last_error: None,
            created_at: updated_at,
            updated_at,
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        assert_eq!(backoff(1), Duration::from_secs(5));
        assert_eq!(backoff(2), Duration::from_secs(10));
        assert_eq!(backoff(3), Duration::from_secs(20));
        assert_eq!(backoff(10), Duration::from_secs(RETRY_MAX_DELAY_SECS));
    }

    #[test]
    fn test_is_due_waits_for_backoff() {
        assert!(!is_due(&row(1, 1_000), 1_000 + 4_999));
        assert!(is_due(&row(1, 1_000), 1_000 + 5_000));
        // 未尝试过的任务：可能仍在通道中
        assert!(!is_due(&row(0, 1_000), 1_000 + 5_000));
        assert!(is_due(&row(0, 1_000), 1_000 + 60_000));
    }

    #[tokio::test]
    async fn test_enqueue_full_and_closed_hand_back_the_job() {
        let (queue, rx) = WebhookQueue::new(1);
        queue.enqueue(job(1, "evt_1")).expect("first fits");

        match queue.enqueue(job(2, "evt_2")) {
            Err(EnqueueError::Full(returned)) => assert_eq!(returned.event.provider_event_id, "evt_2"),
            other => panic!("expected Full, got {other:?}"),
        }

        drop(rx);
        match queue.enqueue(job(3, "evt_3")) {
            Err(EnqueueError::Closed(returned)) => assert_eq!(returned.id, 3),
            other => panic!("expected Closed, got {other:?}"),
        }
    }
}
