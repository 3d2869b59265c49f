//! Span propagation and metric events.
//!
//! Jobs cross from the submitting thread to a worker thread, so the span that
//! was current at submission is lost unless it travels with the job.
//! [`TracedJob`] carries it. With the `tracing` feature off it only forwards
//! to the inner job.
//!
//! With the feature on, each worker thread runs inside a `worker` span and the
//! [`metrics`] functions emit `counter.*`, `gauge.*` and `histogram.*` fields
//! for a subscriber to aggregate.
//!
//! ```rust,ignore
//! let span = tracing::info_span!("order", id = 42);
//! let _entered = span.enter();
//! // Runs on the order's worker, inside the "order" span
//! router.submit_traced(42u64, ShipOrder::new(42));
//! ```

use crate::core::{Job, Result};
#[cfg(feature = "tracing")]
use std::time::Duration;

/// Runs its inner job inside the span that was current when it was built.
pub struct TracedJob<J: Job> {
    inner: J,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

impl<J: Job> TracedJob<J> {
    /// Wrap `job`, capturing the caller's current span
    pub fn new(job: J) -> Self {
        Self {
            inner: job,
            #[cfg(feature = "tracing")]
            span: tracing::Span::current(),
        }
    }
}

impl<J: Job> Job for TracedJob<J> {
    fn execute(&mut self) -> Result<()> {
        #[cfg(feature = "tracing")]
        let _guard = self.span.enter();
        self.inner.execute()
    }

    fn job_type(&self) -> &str {
        self.inner.job_type()
    }
}

/// Router and worker events, one function per event.
#[cfg(feature = "tracing")]
pub mod metrics {
    use super::*;

    /// A job was queued on `worker_index`.
    #[inline]
    pub fn record_submission(worker_index: usize, queue_depth: usize) {
        tracing::trace!(
            counter.jobs_submitted = 1,
            worker_index = worker_index,
            gauge.queue_depth = queue_depth as i64,
            "job submitted"
        );
    }

    /// A job returned, successfully or with an error.
    #[inline]
    pub fn record_completion(duration: Duration, success: bool) {
        let duration_ms = duration.as_millis() as u64;
        if success {
            tracing::trace!(
                counter.jobs_completed = 1,
                histogram.job_duration_ms = duration_ms,
                "job completed successfully"
            );
        } else {
            tracing::trace!(
                counter.jobs_failed = 1,
                histogram.job_duration_ms = duration_ms,
                "job failed"
            );
        }
    }

    /// A job panicked; the worker caught it and carried on.
    #[inline]
    pub fn record_panic(duration: Duration) {
        tracing::trace!(
            counter.jobs_panicked = 1,
            histogram.job_duration_ms = duration.as_millis() as u64,
            "job panicked"
        );
    }

    /// `worker_index` picked up a job.
    #[inline]
    pub fn record_worker_busy(worker_index: usize) {
        tracing::trace!(
            gauge.workers_busy = 1,
            worker_index = worker_index,
            "worker busy"
        );
    }

    /// `worker_index` finished a job.
    #[inline]
    pub fn record_worker_idle(worker_index: usize) {
        tracing::trace!(
            gauge.workers_busy = -1i64,
            worker_index = worker_index,
            "worker idle"
        );
    }

    /// Every worker passed its startup barrier.
    #[inline]
    pub fn record_router_start(num_workers: usize, strategy: &str) {
        tracing::info!(
            workers = num_workers,
            strategy = strategy,
            "affinity router started"
        );
    }

    /// Shutdown finished; `unexecuted` jobs were handed back.
    #[inline]
    pub fn record_router_shutdown(jobs_processed: u64, unexecuted: usize) {
        tracing::info!(
            jobs_processed = jobs_processed,
            unexecuted = unexecuted,
            "affinity router shutdown complete"
        );
    }
}
