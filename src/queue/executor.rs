//! Backend execution with timing discipline
//!
//! One call per job: stamp `started_at` immediately before backend work,
//! `finished_at` immediately after, success or failure, and normalize
//! every failure mode into a terminal [`JobOutcome`]. Nothing escapes this
//! boundary: a panic or deadline overrun still yields a finished record.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::backend::traits::{BackendError, GenerationBackend, GenerationRequest};
use crate::queue::job::{JobMetrics, JobOutcome, JobTimings};

/// Result of running one job to its terminal state
pub(crate) struct CompletedExecution {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: JobOutcome,
}

/// Execute a job against the backend under the substrate's deadline.
pub(crate) async fn execute_job(
    job_id: &str,
    params: GenerationRequest,
    enqueue_time: DateTime<Utc>,
    backend: Arc<dyn GenerationBackend>,
    deadline: Duration,
) -> CompletedExecution {
    let started_at = Utc::now();

    info!(
        job_id = %job_id,
        backend = %backend.name(),
        prompt_chars = params.prompt.len(),
        "Starting job"
    );

    // The backend call runs in its own task so a panic inside an engine is
    // contained and normalized instead of killing the worker.
    let backend_for_task = backend.clone();
    let handle = tokio::spawn(async move { backend_for_task.generate(&params).await });
    let abort_handle = handle.abort_handle();
    let generation = tokio::time::timeout(deadline, handle).await;

    if generation.is_err() {
        abort_handle.abort();
    }

    let finished_at = Utc::now();
    let timings = JobTimings::from_stamps(enqueue_time, started_at, finished_at);

    let outcome = match generation {
        Ok(Ok(Ok(generation))) => {
            let metrics = JobMetrics::new(
                timings,
                generation.prompt_tokens,
                generation.completion_tokens,
            );

            info!(
                job_id = %job_id,
                completion_tokens = generation.completion_tokens,
                processing_time = timings.processing_time,
                tokens_per_second = metrics.tokens_per_second,
                "Job completed"
            );

            JobOutcome::Completed {
                result: generation.text,
                metrics,
            }
        }
        Ok(Ok(Err(backend_error))) => {
            error!(
                job_id = %job_id,
                error_kind = backend_error.kind(),
                error = %backend_error,
                "Job failed"
            );

            JobOutcome::Failed {
                error_message: backend_error.to_string(),
                error_kind: backend_error.kind().to_string(),
                timings: Some(timings),
            }
        }
        Ok(Err(join_error)) => {
            // Panicked or cancelled inside the backend task.
            let normalized =
                BackendError::Generation(format!("backend task aborted: {}", join_error));

            error!(job_id = %job_id, error = %normalized, "Job failed");

            JobOutcome::Failed {
                error_message: normalized.to_string(),
                error_kind: normalized.kind().to_string(),
                timings: Some(timings),
            }
        }
        Err(_elapsed) => {
            let normalized = BackendError::Timeout(format!(
                "execution exceeded deadline of {}s",
                deadline.as_secs()
            ));

            error!(job_id = %job_id, error = %normalized, "Job timed out");

            JobOutcome::Failed {
                error_message: normalized.to_string(),
                error_kind: normalized.kind().to_string(),
                timings: Some(timings),
            }
        }
    };

    CompletedExecution {
        started_at,
        finished_at,
        outcome,
    }
}
