//! Asynchronous job queue backed by an in-process worker pool
//!
//! Submission hands the job to a bounded channel and returns a handle
//! immediately; a worker loop drains the channel under a concurrency
//! semaphore and drives each job through the executor. Status and result
//! lookups are non-blocking reads of the job store.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::backend::traits::{GenerationBackend, GenerationRequest};
use crate::config::QueueConfig;
use crate::error::{AppError, Result};
use crate::logging::RequestLog;
use crate::metrics::MetricsRegistry;
use crate::queue::executor;
use crate::queue::job::{JobOutcome, JobRecord, JobStatus};

/// Work item handed to the worker loop
struct JobTask {
    job_id: String,
}

/// Non-blocking result poll
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// Not finished yet; carries the current status
    Pending(JobStatus),
    /// Finished; the payload is stable across repeated polls
    Ready(JobOutcome),
}

/// Job queue facade over the worker-pool execution substrate
pub struct JobQueue {
    jobs: Arc<DashMap<String, JobRecord>>,
    task_tx: mpsc::Sender<JobTask>,
    config: QueueConfig,
    metrics: Arc<MetricsRegistry>,
}

impl JobQueue {
    /// Create a queue and start its worker loop and retention sweeper.
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        config: QueueConfig,
        metrics: Arc<MetricsRegistry>,
        request_log: Arc<RequestLog>,
    ) -> Arc<Self> {
        let (task_tx, task_rx) = mpsc::channel(config.max_queue_size);
        let jobs: Arc<DashMap<String, JobRecord>> = Arc::new(DashMap::new());

        let queue = Arc::new(Self {
            jobs: jobs.clone(),
            task_tx,
            config: config.clone(),
            metrics: metrics.clone(),
        });

        tokio::spawn(Self::process_jobs(
            task_rx,
            jobs.clone(),
            backend,
            Arc::new(Semaphore::new(config.max_concurrent)),
            Duration::from_secs(config.timeout_secs),
            metrics,
            request_log,
        ));

        tokio::spawn(Self::sweep_expired(
            jobs,
            Duration::from_secs(config.result_ttl_secs),
        ));

        queue
    }

    /// Submit a job for execution.
    ///
    /// Returns the opaque job ID immediately; execution happens on the
    /// worker pool. The enqueue stamp is taken here, before handoff.
    pub fn submit(
        &self,
        params: GenerationRequest,
        user_id: Option<String>,
    ) -> Result<String> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let record = JobRecord::queued(job_id.clone(), params, user_id.clone());

        self.jobs.insert(job_id.clone(), record);

        if let Err(e) = self.task_tx.try_send(JobTask {
            job_id: job_id.clone(),
        }) {
            // Handoff failed: drop the record so a poll cannot observe a
            // job the substrate will never run.
            self.jobs.remove(&job_id);

            return match e {
                mpsc::error::TrySendError::Full(_) => Err(AppError::SubstrateUnavailable(
                    "job queue is full".to_string(),
                )),
                mpsc::error::TrySendError::Closed(_) => Err(AppError::SubstrateUnavailable(
                    "job queue worker is not running".to_string(),
                )),
            };
        }

        let user = user_id.as_deref().unwrap_or("anonymous");
        self.metrics.record_job_submitted(user);

        debug!(job_id = %job_id, user = %user, "Job queued");

        Ok(job_id)
    }

    /// Current status of a job.
    pub fn status(&self, job_id: &str) -> Result<JobStatus> {
        self.jobs
            .get(job_id)
            .map(|record| record.status)
            .ok_or_else(|| AppError::UnknownJob(job_id.to_string()))
    }

    /// Non-blocking result poll.
    ///
    /// Idempotent once a job is terminal: every call clones the same
    /// outcome payload.
    pub fn result(&self, job_id: &str) -> Result<JobPoll> {
        let record = self
            .jobs
            .get(job_id)
            .ok_or_else(|| AppError::UnknownJob(job_id.to_string()))?;

        match &record.outcome {
            Some(outcome) => Ok(JobPoll::Ready(outcome.clone())),
            None => Ok(JobPoll::Pending(record.status)),
        }
    }

    /// Whether the substrate is accepting submissions.
    pub fn is_open(&self) -> bool {
        !self.task_tx.is_closed()
    }

    /// Number of jobs currently tracked (queued, running or retained).
    pub fn tracked_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Configured execution deadline.
    pub fn execution_deadline(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Worker loop: one backend execution per job, bounded by the
    /// concurrency semaphore.
    async fn process_jobs(
        mut task_rx: mpsc::Receiver<JobTask>,
        jobs: Arc<DashMap<String, JobRecord>>,
        backend: Arc<dyn GenerationBackend>,
        semaphore: Arc<Semaphore>,
        deadline: Duration,
        metrics: Arc<MetricsRegistry>,
        request_log: Arc<RequestLog>,
    ) {
        while let Some(task) = task_rx.recv().await {
            // Hold a permit before draining the next message so the channel
            // backs up when the pool is saturated and submission sees a
            // full queue instead of unbounded task buildup.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let jobs = jobs.clone();
            let backend = backend.clone();
            let metrics = metrics.clone();
            let request_log = request_log.clone();

            tokio::spawn(async move {
                let _permit = permit;

                // The record may have been evicted if the job sat in queue
                // past the retention window; nothing left to do then.
                let Some((params, enqueue_time)) =
                    jobs.get_mut(&task.job_id).map(|mut record| {
                        record.status = JobStatus::Processing;
                        record.started_at = Some(Utc::now());
                        (record.params.clone(), record.enqueue_time)
                    })
                else {
                    warn!(job_id = %task.job_id, "Job record vanished before execution");
                    return;
                };

                let execution =
                    executor::execute_job(&task.job_id, params, enqueue_time, backend, deadline)
                        .await;

                metrics.record_job_finished(&execution.outcome);
                request_log.record_job(
                    &task.job_id,
                    enqueue_time,
                    execution.started_at,
                    execution.finished_at,
                    &execution.outcome,
                );

                if let Some(mut record) = jobs.get_mut(&task.job_id) {
                    record.status = execution.outcome.status();
                    record.started_at = Some(execution.started_at);
                    record.finished_at = Some(execution.finished_at);
                    record.outcome = Some(execution.outcome);
                }
            });
        }

        info!("Job queue worker loop stopped");
    }

    /// Retention sweeper: evicts terminal records past their TTL.
    async fn sweep_expired(jobs: Arc<DashMap<String, JobRecord>>, ttl: Duration) {
        let ttl_chrono = chrono::Duration::from_std(ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(3600));
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let cutoff = Utc::now() - ttl_chrono;
            let before = jobs.len();
            jobs.retain(|_, record| {
                !(record.status.is_terminal()
                    && record.finished_at.map(|t| t < cutoff).unwrap_or(false))
            });

            let evicted = before.saturating_sub(jobs.len());
            if evicted > 0 {
                debug!(evicted, "Evicted expired job results");
            }
        }
    }
}
