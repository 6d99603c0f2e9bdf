use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::db::{self, Db, Message};
use crate::jobs::{Job, JobError};

/// How long a pulled message stays invisible before an abandoned handler
/// lets it reappear.
pub const VISIBILITY_SECS: i64 = 300;
/// Delivery budget per message, counting the first attempt.
pub const MAX_ATTEMPTS: i64 = 5;
const RETRY_BASE_SECS: i64 = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What a completed job did, for the worker log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunReport {
    pub enqueued: usize,
    pub upserted: usize,
}

/// The seam between queue plumbing and job semantics. The worker owns
/// delivery, status transitions, and retry; the runner owns everything
/// between `processing` and the verdict.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: Job) -> impl Future<Output = Result<RunReport>> + Send;
}

pub struct Worker<R> {
    db: Db,
    runner: Arc<R>,
    batch_size: usize,
}

impl<R: JobRunner> Worker<R> {
    pub fn new(db: Db, runner: R, batch_size: usize) -> Self {
        Worker { db, runner: Arc::new(runner), batch_size }
    }

    /// Pull one batch and handle every message concurrently, one task per
    /// message. Returns after all tasks finish; nothing outlives the batch.
    pub async fn run_batch(&self) -> Result<usize> {
        let batch = {
            let conn = self.db.lock().unwrap();
            db::pull_batch(&conn, self.batch_size, VISIBILITY_SECS)?
        };
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tasks = JoinSet::new();
        let count = batch.len();
        for message in batch {
            let db = self.db.clone();
            let runner = self.runner.clone();
            tasks.spawn(async move {
                if let Err(e) = handle_message(&db, runner.as_ref(), message).await {
                    warn!("message handling failed: {:#}", e);
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined?;
        }
        Ok(count)
    }

    /// Drain the queue: keep pulling until a batch comes back empty.
    pub async fn run_until_idle(&self) -> Result<usize> {
        let mut total = 0;
        loop {
            let n = self.run_batch().await?;
            if n == 0 {
                return Ok(total);
            }
            total += n;
        }
    }

    /// Long-running consumer loop. Sleeps between polls when idle.
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.run_batch().await? == 0 {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

/// One message, end to end. The job row is the source of truth: the
/// message only carries its id. Failure writes exactly one error-log row,
/// marks the job failed, and schedules redelivery until the attempt budget
/// runs out.
async fn handle_message<R: JobRunner>(db: &Db, runner: &R, message: Message) -> Result<()> {
    let job = {
        let conn = db.lock().unwrap();
        let job = db::get_job(&conn, message.job_id)?;
        match job {
            Some(job) => {
                db::mark_processing(&conn, job.id)?;
                job
            }
            None => {
                // Deleted out from under the queue; nothing to do.
                warn!("message {} references missing job {}", message.id, message.job_id);
                db::ack(&conn, message.id)?;
                return Ok(());
            }
        }
    };

    let job_id = job.id;
    let job_type = job.job_type;
    match runner.run(job).await {
        Ok(report) => {
            let conn = db.lock().unwrap();
            db::mark_completed(&conn, job_id)?;
            db::ack(&conn, message.id)?;
            info!(
                "job {} ({}) completed: {} enqueued, {} upserted",
                job_id, job_type, report.enqueued, report.upserted
            );
        }
        Err(e) => {
            let err = JobError::classify(e);
            let backoff = RETRY_BASE_SECS * 2i64.pow(message.attempts.min(8) as u32);
            let conn = db.lock().unwrap();
            db::insert_error(&conn, job_id, err.kind.as_str(), &err.message, err.stack.as_deref())?;
            db::mark_failed(&conn, job_id)?;
            let requeued = db::retry(&conn, &message, backoff, MAX_ATTEMPTS)?;
            if requeued {
                warn!(
                    "job {} ({}) failed ({}), retry in {}s: {}",
                    job_id, job_type, err.kind, backoff, err.message
                );
            } else {
                warn!(
                    "job {} ({}) failed permanently after {} attempts: {}",
                    job_id, job_type, message.attempts + 1, err.message
                );
            }
        }
    }
    Ok(())
}

// ── Tests ──
