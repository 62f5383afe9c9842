//! Progress streaming over the poll-only job queue
//!
//! Adapts status polling into a monotonic sequence of state-change events
//! for a single job. The stream owns its poll timer and terminates
//! deterministically: either on a terminal status (terminal payload, then
//! an end sentinel) or when the consumer drops it. Dropping the stream
//! stops the polling only; the underlying job keeps running.

use futures::stream::{self, Stream};
use std::sync::Arc;
use std::time::Duration;

use crate::queue::{JobMetrics, JobOutcome, JobPoll, JobQueue, JobStatus};

/// One event in a job's progress stream
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Non-terminal state observation (deduplicated against the previous one)
    Status { status: JobStatus, message: String },
    /// Terminal payload of a successful job
    Completed { result: String, metrics: JobMetrics },
    /// Terminal payload of a failed job
    Failed {
        error_message: String,
        error_kind: String,
    },
    /// End-of-stream sentinel, always the last event
    Done,
}

/// Internal poll-loop state
enum PollState {
    /// No event emitted yet
    Initial,
    /// Watching for a transition away from the last emitted status
    Watching(JobStatus),
    /// Terminal payload emitted; the sentinel is next
    EmitDone,
    Closed,
}

/// Builds progress event streams over the job queue
pub struct ProgressStreamer {
    queue: Arc<JobQueue>,
    poll_interval: Duration,
}

impl ProgressStreamer {
    pub fn new(queue: Arc<JobQueue>, poll_interval: Duration) -> Self {
        Self {
            queue,
            poll_interval,
        }
    }

    /// Event sequence for one job.
    ///
    /// A job that is already terminal at stream-open time yields exactly
    /// one terminal event followed by [`JobEvent::Done`], with no
    /// intermediate status events.
    pub fn events(&self, job_id: String) -> impl Stream<Item = JobEvent> + Send + 'static {
        let queue = self.queue.clone();
        let poll_interval = self.poll_interval;

        stream::unfold(PollState::Initial, move |state| {
            let queue = queue.clone();
            let job_id = job_id.clone();

            async move {
                match state {
                    PollState::Initial => match queue.status(&job_id) {
                        Err(_) => Some((unknown_job_event(&job_id), PollState::EmitDone)),
                        Ok(status) if status.is_terminal() => {
                            Some((terminal_event(&queue, &job_id), PollState::EmitDone))
                        }
                        Ok(status) => Some((
                            JobEvent::Status {
                                status,
                                message: status.describe().to_string(),
                            },
                            PollState::Watching(status),
                        )),
                    },
                    PollState::Watching(last) => loop {
                        tokio::time::sleep(poll_interval).await;

                        match queue.status(&job_id) {
                            Err(_) => {
                                // Evicted mid-stream: surface it and end.
                                break Some((unknown_job_event(&job_id), PollState::EmitDone));
                            }
                            Ok(status) if status.is_terminal() => {
                                break Some((
                                    terminal_event(&queue, &job_id),
                                    PollState::EmitDone,
                                ));
                            }
                            Ok(status) if status != last => {
                                break Some((
                                    JobEvent::Status {
                                        status,
                                        message: status.describe().to_string(),
                                    },
                                    PollState::Watching(status),
                                ));
                            }
                            Ok(_) => continue,
                        }
                    },
                    PollState::EmitDone => Some((JobEvent::Done, PollState::Closed)),
                    PollState::Closed => None,
                }
            }
        })
    }
}

/// Fetch the terminal payload once and turn it into the final data event.
fn terminal_event(queue: &JobQueue, job_id: &str) -> JobEvent {
    match queue.result(job_id) {
        Ok(JobPoll::Ready(JobOutcome::Completed { result, metrics })) => {
            JobEvent::Completed { result, metrics }
        }
        Ok(JobPoll::Ready(JobOutcome::Failed {
            error_message,
            error_kind,
            ..
        })) => JobEvent::Failed {
            error_message,
            error_kind,
        },
        // A terminal status without a payload means the record was evicted
        // between the two reads.
        _ => unknown_job_event(job_id),
    }
}

fn unknown_job_event(job_id: &str) -> JobEvent {
    JobEvent::Failed {
        error_message: format!("no record of job {}", job_id),
        error_kind: "UnknownJob".to_string(),
    }
}
