//! Background jobs
//!
//! Every webhook delivery is persisted as a `webhook_jobs` row before the
//! provider gets its response, then handed to the queue when possible and run
//! inline when the queue rejects it. Both paths call [`run_job`], so the
//! outcome does not depend on the path, and a job that fails stays on disk
//! for the worker's rescan.

pub mod webhook_queue;

pub use webhook_queue::{WebhookQueue, WebhookWorker};

use serde::Serialize;
use shared::now_millis;
use shared::payment::ProviderEvent;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::db::webhook_jobs;
use crate::payments::{IngestReport, IngestResult, WebhookIngestor};

/// A persisted delivery travelling through the queue
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookJob {
    /// `webhook_jobs.id`
    pub id: i64,
    pub event: ProviderEvent,
}

/// Enqueue rejected; the job is handed back to the caller
#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("webhook queue is full")]
    Full(WebhookJob),
    #[error("webhook queue is closed")]
    Closed(WebhookJob),
}

impl EnqueueError {
    pub fn into_job(self) -> WebhookJob {
        match self {
            EnqueueError::Full(job) | EnqueueError::Closed(job) => job,
        }
    }
}

/// Asynchronous hand-off of persisted jobs
pub trait JobEnqueuer: Send + Sync {
    fn enqueue(&self, job: WebhookJob) -> Result<(), EnqueueError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DispatchMode {
    Queued,
    Inline(IngestReport),
}

/// Run one job and record the outcome on its row: deleted on success,
/// retry count bumped on failure.
pub(crate) async fn run_job(
    ingestor: &WebhookIngestor,
    pool: &SqlitePool,
    job: &WebhookJob,
    ledger_committed: bool,
) -> IngestResult<IngestReport> {
    let result = if ledger_committed {
        ingestor.resume(&job.event).await
    } else {
        ingestor.ingest(&job.event).await
    };

    match &result {
        Ok(_) => {
            if let Err(e) = webhook_jobs::complete(pool, job.id).await {
                // 行残留只会导致一次幂等重放
                warn!(job_id = job.id, error = %e, "Failed to delete finished webhook job");
            }
        }
        Err(e) => {
            match webhook_jobs::mark_failed(pool, job.id, &e.to_string(), e.ledger_committed(), now_millis())
                .await
            {
                Ok(retry_count) => warn!(
                    job_id = job.id,
                    provider_event_id = %job.event.provider_event_id,
                    retry_count,
                    error = %e,
                    "Webhook job failed, kept for retry"
                ),
                Err(db) => error!(job_id = job.id, error = %db, "Failed to record webhook job failure"),
            }
        }
    }
    result
}

/// Persist, then queue first and inline on rejection
#[derive(Clone)]
pub struct WebhookDispatcher {
    enqueuer: Arc<dyn JobEnqueuer>,
    ingestor: WebhookIngestor,
    pool: SqlitePool,
}

impl std::fmt::Debug for WebhookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookDispatcher").finish_non_exhaustive()
    }
}

impl WebhookDispatcher {
    pub fn new(enqueuer: Arc<dyn JobEnqueuer>, ingestor: WebhookIngestor) -> Self {
        Self {
            enqueuer,
            pool: ingestor.pool().clone(),
            ingestor,
        }
    }

    pub async fn dispatch(&self, event: ProviderEvent) -> IngestResult<DispatchMode> {
        let id = webhook_jobs::insert_pending(&self.pool, &event, now_millis()).await?;
        debug!(job_id = id, provider_event_id = %event.provider_event_id, "Webhook job persisted");

        match self.enqueuer.enqueue(WebhookJob { id, event }) {
            Ok(()) => Ok(DispatchMode::Queued),
            Err(e) => {
                warn!(error = %e, "Enqueue failed, ingesting inline");
                let job = e.into_job();
                let report = run_job(&self.ingestor, &self.pool, &job, false).await?;
                Ok(DispatchMode::Inline(report))
            }
        }
    }
}
