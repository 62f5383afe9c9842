//! File-based request log
//!
//! Every finished job appends one human-readable key=value line to
//! `llm_requests.log`; failures additionally append a detail block to
//! `errors.log`. Log I/O problems degrade to a `tracing` warning so the
//! worker never dies over observability.

use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

use crate::error::Result;
use crate::queue::job::{JobOutcome, JobTimings};

const REQUEST_LOG_FILE: &str = "llm_requests.log";
const ERROR_LOG_FILE: &str = "errors.log";

/// Appender for the request and error log files
pub struct RequestLog {
    dir: PathBuf,
}

impl RequestLog {
    /// Create the log directory if needed and return the appender.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Append the completion line for a finished job.
    pub fn record_job(
        &self,
        job_id: &str,
        enqueue_time: DateTime<Utc>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        outcome: &JobOutcome,
    ) {
        let timings = JobTimings::from_stamps(enqueue_time, started_at, finished_at);
        let timestamp = finished_at.format("%Y-%m-%d %H:%M:%S");

        let mut parts = vec![
            format!("[{}]", timestamp),
            format!("job_id={}", job_id),
        ];

        match outcome {
            JobOutcome::Completed { metrics, .. } => {
                parts.push("status=success".to_string());
                parts.push(format!("prompt_tokens={}", metrics.prompt_tokens));
                parts.push(format!("completion_tokens={}", metrics.completion_tokens));
                if metrics.processing_time > 0.0 {
                    parts.push(format!("tokens_per_sec={:.2}", metrics.tokens_per_second));
                }
            }
            JobOutcome::Failed { .. } => {
                parts.push("status=error".to_string());
            }
        }

        parts.push(format!("queue_wait={:.2}s", timings.queue_wait_time));
        parts.push(format!("processing_time={:.2}s", timings.processing_time));
        parts.push(format!("total_time={:.2}s", timings.total_time));

        if let JobOutcome::Failed {
            error_message,
            error_kind,
            ..
        } = outcome
        {
            parts.push(format!("error_message=\"{}\"", error_message));
            self.record_error(job_id, error_kind, error_message);
        }

        self.append(REQUEST_LOG_FILE, &(parts.join(" ") + "\n"));
    }

    /// Append a failure detail block to the error log.
    pub fn record_error(&self, job_id: &str, error_kind: &str, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        let entry = format!(
            "\n{divider}\n[{timestamp}] ERROR - Job {job_id} failed\nError Kind: {error_kind}\nError Message: {message}\n{divider}\n",
            divider = "=".repeat(80),
        );

        self.append(ERROR_LOG_FILE, &entry);
    }

    fn append(&self, file: &str, entry: &str) {
        let path = self.dir.join(file);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(entry.as_bytes()));

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write request log");
        }
    }
}
