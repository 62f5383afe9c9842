//! Prometheus metrics for the inference gateway
//!
//! All measurements live in one [`MetricsRegistry`] owning a private
//! `prometheus::Registry`, constructed once at startup and threaded into
//! the components that update it. Reads happen through [`MetricsRegistry::render`],
//! the pull-based text exposition consumed by the `/metrics` route.

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::error::{AppError, Result};
use crate::queue::job::JobOutcome;

/// Process-wide metrics registry
pub struct MetricsRegistry {
    registry: Registry,

    // Request metrics
    http_requests_total: CounterVec,
    http_request_duration_seconds: HistogramVec,

    // Job metrics
    jobs_submitted_total: CounterVec,
    jobs_completed_total: CounterVec,
    job_queue_wait_seconds: Histogram,
    job_processing_seconds: Histogram,
    job_total_seconds: Histogram,

    // Token metrics
    tokens_generated_total: IntCounter,
    tokens_per_second: Histogram,

    // System metrics
    jobs_in_flight: IntGauge,
    queue_broker_up: IntGauge,
    backend_ready: IntGauge,
}

fn registration_error(e: prometheus::Error) -> AppError {
    AppError::Internal(format!("metrics registration failed: {}", e))
}

impl MetricsRegistry {
    /// Construct and register all metric families.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(http_requests_total.clone()))
            .map_err(registration_error)?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "path"],
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .map_err(registration_error)?;

        let jobs_submitted_total = CounterVec::new(
            Opts::new("jobs_submitted_total", "Total jobs submitted"),
            &["user"],
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(jobs_submitted_total.clone()))
            .map_err(registration_error)?;

        let jobs_completed_total = CounterVec::new(
            Opts::new("jobs_completed_total", "Total jobs finished by terminal status"),
            &["status"],
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(jobs_completed_total.clone()))
            .map_err(registration_error)?;

        let job_queue_wait_seconds = Histogram::with_opts(HistogramOpts::new(
            "job_queue_wait_seconds",
            "Job queue wait time in seconds",
        ))
        .map_err(registration_error)?;
        registry
            .register(Box::new(job_queue_wait_seconds.clone()))
            .map_err(registration_error)?;

        let job_processing_seconds = Histogram::with_opts(HistogramOpts::new(
            "job_processing_seconds",
            "Job processing time in seconds",
        ))
        .map_err(registration_error)?;
        registry
            .register(Box::new(job_processing_seconds.clone()))
            .map_err(registration_error)?;

        let job_total_seconds = Histogram::with_opts(HistogramOpts::new(
            "job_total_seconds",
            "Job total time from submission to completion in seconds",
        ))
        .map_err(registration_error)?;
        registry
            .register(Box::new(job_total_seconds.clone()))
            .map_err(registration_error)?;

        let tokens_generated_total = IntCounter::new(
            "tokens_generated_total",
            "Total tokens generated across completed jobs",
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(tokens_generated_total.clone()))
            .map_err(registration_error)?;

        let tokens_per_second = Histogram::with_opts(HistogramOpts::new(
            "tokens_per_second",
            "Token generation speed",
        ))
        .map_err(registration_error)?;
        registry
            .register(Box::new(tokens_per_second.clone()))
            .map_err(registration_error)?;

        let jobs_in_flight = IntGauge::new(
            "jobs_in_flight",
            "Jobs submitted but not yet finished",
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(jobs_in_flight.clone()))
            .map_err(registration_error)?;

        let queue_broker_up = IntGauge::new(
            "queue_broker_up",
            "Queue substrate reachability (1=up, 0=down)",
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(queue_broker_up.clone()))
            .map_err(registration_error)?;

        let backend_ready = IntGauge::new(
            "backend_ready",
            "Generation backend readiness (1=ready, 0=not ready)",
        )
        .map_err(registration_error)?;
        registry
            .register(Box::new(backend_ready.clone()))
            .map_err(registration_error)?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            jobs_submitted_total,
            jobs_completed_total,
            job_queue_wait_seconds,
            job_processing_seconds,
            job_total_seconds,
            tokens_generated_total,
            tokens_per_second,
            jobs_in_flight,
            queue_broker_up,
            backend_ready,
        })
    }

    /// Record one served HTTP request.
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    /// Record a job submission and bump the in-flight gauge.
    pub fn record_job_submitted(&self, user: &str) {
        self.jobs_submitted_total.with_label_values(&[user]).inc();
        self.jobs_in_flight.inc();
    }

    /// Record a finished job: terminal counter, latency histograms, token
    /// throughput, and the in-flight gauge decrement.
    pub fn record_job_finished(&self, outcome: &JobOutcome) {
        self.jobs_in_flight.dec();

        match outcome {
            JobOutcome::Completed { metrics, .. } => {
                self.jobs_completed_total
                    .with_label_values(&["completed"])
                    .inc();
                self.job_queue_wait_seconds.observe(metrics.queue_wait_time);
                self.job_processing_seconds.observe(metrics.processing_time);
                self.job_total_seconds.observe(metrics.total_time);

                if metrics.completion_tokens > 0 {
                    self.tokens_generated_total
                        .inc_by(u64::from(metrics.completion_tokens));
                }
                if metrics.tokens_per_second > 0.0 {
                    self.tokens_per_second.observe(metrics.tokens_per_second);
                }
            }
            JobOutcome::Failed { timings, .. } => {
                self.jobs_completed_total
                    .with_label_values(&["failed"])
                    .inc();

                // Failed jobs still contribute whatever timings were reached.
                if let Some(timings) = timings {
                    self.job_queue_wait_seconds.observe(timings.queue_wait_time);
                    self.job_processing_seconds.observe(timings.processing_time);
                    self.job_total_seconds.observe(timings.total_time);
                }
            }
        }
    }

    /// Update downstream dependency health gauges.
    pub fn set_dependency_health(&self, queue_up: bool, backend_ready: bool) {
        self.queue_broker_up.set(i64::from(queue_up));
        self.backend_ready.set(i64::from(backend_ready));
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();

        if encoder.encode(&families, &mut buffer).is_err() {
            return String::new();
        }

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::job::{JobMetrics, JobTimings};

    #[test]
    fn test_render_contains_families() {
        let metrics = MetricsRegistry::new().unwrap();

        metrics.record_http_request("POST", "/generate", 202, 0.012);
        metrics.record_job_submitted("tester");

        let timings = JobTimings {
            queue_wait_time: 0.1,
            processing_time: 0.5,
            total_time: 0.6,
        };
        metrics.record_job_finished(&JobOutcome::Completed {
            result: "ok".to_string(),
            metrics: JobMetrics::new(timings, 3, 12),
        });

        let text = metrics.render();
        assert!(text.contains("http_requests_total"));
        assert!(text.contains("jobs_submitted_total"));
        assert!(text.contains("jobs_completed_total"));
        assert!(text.contains("job_queue_wait_seconds"));
        assert!(text.contains("tokens_generated_total"));
        assert!(text.contains("jobs_in_flight"));
    }

    #[test]
    fn test_in_flight_gauge_balances() {
        let metrics = MetricsRegistry::new().unwrap();

        metrics.record_job_submitted("a");
        metrics.record_job_submitted("b");
        metrics.record_job_finished(&JobOutcome::Failed {
            error_message: "boom".to_string(),
            error_kind: "BackendError".to_string(),
            timings: None,
        });

        assert_eq!(metrics.jobs_in_flight.get(), 1);
    }
}
