//! Job records - the tracked state of one submitted generation request

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::traits::GenerationRequest;

/// Canonical job states.
///
/// `Unknown` covers substrate-specific transient states that do not map
/// onto the four canonical ones; it is passed through to clients rather
/// than treated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Human-readable message used by status responses and stream events.
    pub fn describe(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Job is waiting in queue",
            JobStatus::Processing => "Job is currently being processed",
            JobStatus::Completed => "Job completed successfully",
            JobStatus::Failed => "Job failed during processing",
            JobStatus::Unknown => "Job is in a transient state",
        }
    }
}

/// Latency breakdown for a job whose processing started
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JobTimings {
    /// Seconds spent waiting in queue
    pub queue_wait_time: f64,
    /// Seconds spent processing
    pub processing_time: f64,
    /// Seconds from submission to completion
    pub total_time: f64,
}

impl JobTimings {
    /// Derive the breakdown from the three lifecycle stamps.
    pub fn from_stamps(
        enqueue_time: DateTime<Utc>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            queue_wait_time: seconds_between(enqueue_time, started_at),
            processing_time: seconds_between(started_at, finished_at),
            total_time: seconds_between(enqueue_time, finished_at),
        }
    }
}

/// Performance metrics for a completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub queue_wait_time: f64,
    pub processing_time: f64,
    pub total_time: f64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub tokens_per_second: f64,
}

impl JobMetrics {
    pub fn new(timings: JobTimings, prompt_tokens: u32, completion_tokens: u32) -> Self {
        let tokens_per_second = if timings.processing_time > 0.0 {
            f64::from(completion_tokens) / timings.processing_time
        } else {
            0.0
        };

        Self {
            queue_wait_time: timings.queue_wait_time,
            processing_time: timings.processing_time,
            total_time: timings.total_time,
            prompt_tokens,
            completion_tokens,
            tokens_per_second,
        }
    }
}

/// Terminal payload of a finished job.
///
/// Exactly one of the variants exists once a job reaches a terminal
/// status, and it is never mutated afterwards: repeated result polls
/// clone the same payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed {
        result: String,
        metrics: JobMetrics,
    },
    Failed {
        error_message: String,
        error_kind: String,
        /// Present when processing started before the failure.
        timings: Option<JobTimings>,
    },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// The tracked state of one submitted generation request
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: String,
    pub params: GenerationRequest,
    pub user_id: Option<String>,
    pub status: JobStatus,
    pub enqueue_time: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<JobOutcome>,
}

impl JobRecord {
    /// Create a freshly queued record.
    pub fn queued(id: String, params: GenerationRequest, user_id: Option<String>) -> Self {
        Self {
            id,
            params,
            user_id,
            status: JobStatus::Queued,
            enqueue_time: Utc::now(),
            started_at: None,
            finished_at: None,
            outcome: None,
        }
    }
}

/// Fractional seconds between two wall-clock stamps, clamped at zero.
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later.signed_duration_since(earlier);
    delta
        .num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| delta.num_milliseconds() as f64 / 1_000.0)
        .max(0.0)
}
