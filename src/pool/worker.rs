//! Worker thread implementation

use crate::core::{AffinityError, BoxedJob, Result};
use crate::queue::{WorkItem, WorkQueue};
use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::{span, Level};

/// Statistics for a worker thread
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total number of jobs processed
    pub jobs_processed: AtomicU64,
    /// Total number of jobs that failed
    pub jobs_failed: AtomicU64,
    /// Total number of jobs that panicked
    pub jobs_panicked: AtomicU64,
    /// Total time spent processing jobs (microseconds)
    pub total_processing_time_us: AtomicU64,
}

impl WorkerStats {
    /// Create new worker statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment jobs processed counter
    pub fn increment_processed(&self) {
        self.jobs_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs failed counter
    pub fn increment_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment jobs panicked counter
    pub fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    /// Add processing time
    pub fn add_processing_time(&self, microseconds: u64) {
        self.total_processing_time_us
            .fetch_add(microseconds, Ordering::Relaxed);
    }

    /// Get total jobs processed
    pub fn get_jobs_processed(&self) -> u64 {
        self.jobs_processed.load(Ordering::Relaxed)
    }

    /// Get total jobs failed
    pub fn get_jobs_failed(&self) -> u64 {
        self.jobs_failed.load(Ordering::Relaxed)
    }

    /// Get total jobs panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Get average processing time per job in microseconds
    pub fn get_average_processing_time_us(&self) -> f64 {
        let total = self.total_processing_time_us.load(Ordering::Relaxed);
        let count = self.jobs_processed.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }
}

/// Lifecycle of a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Thread spawned, consume loop not yet entered
    Starting,
    /// Consuming its queue
    Running,
    /// Loop exited; the queue no longer accepts work
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Starting,
            1 => WorkerState::Running,
            _ => WorkerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Starting => 0,
            WorkerState::Running => 1,
            WorkerState::Stopped => 2,
        }
    }
}

/// A single dedicated thread consuming its own FIFO queue
///
/// All work handed to one worker runs on the same OS thread, in enqueue order.
#[derive(Debug)]
pub struct Worker {
    index: usize,
    queue: Arc<WorkQueue>,
    state: Arc<AtomicU8>,
    stats: Arc<WorkerStats>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    thread_id: ThreadId,
    // Never sent on; disconnects when the worker thread exits.
    exited: Receiver<()>,
}

impl Worker {
    /// Create and start a new worker
    ///
    /// Does not return until the thread has entered its consume loop.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of this worker in the router
    /// * `thread_name` - Name given to the OS thread
    /// * `queue_capacity` - Pre-allocated queue storage (the queue stays unbounded)
    /// * `stats` - Counters updated by the worker thread
    pub fn new(
        index: usize,
        thread_name: String,
        queue_capacity: usize,
        stats: Arc<WorkerStats>,
    ) -> Result<Self> {
        let queue = Arc::new(WorkQueue::with_capacity(queue_capacity));
        let state = Arc::new(AtomicU8::new(WorkerState::Starting.as_u8()));
        let (started_tx, started_rx) = channel::bounded::<()>(1);
        let (exit_guard, exited) = channel::bounded::<()>(0);

        let thread = {
            let queue = Arc::clone(&queue);
            let state = Arc::clone(&state);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name(thread_name)
                .spawn(move || {
                    let _exit_guard = exit_guard;
                    state.store(WorkerState::Running.as_u8(), Ordering::Release);
                    let _ = started_tx.send(());
                    drop(started_tx);

                    Self::run(index, &queue, &stats);

                    state.store(WorkerState::Stopped.as_u8(), Ordering::Release);
                })
                .map_err(|e| AffinityError::spawn_with_source(index, "Cannot create thread", e))?
        };

        started_rx
            .recv()
            .map_err(|_| AffinityError::startup_failed(index))?;

        log::debug!("worker {} started", index);

        let thread_id = thread.thread().id();
        Ok(Self {
            index,
            queue,
            state,
            stats,
            thread: Mutex::new(Some(thread)),
            thread_id,
            exited,
        })
    }

    /// Get worker index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get worker statistics
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of items waiting in this worker's queue
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Append a job to this worker's queue
    ///
    /// Returns `false` without enqueuing if the worker was cancelled or has stopped.
    pub fn enqueue(&self, job: BoxedJob) -> bool {
        self.queue.push(WorkItem::Task(job)).is_ok()
    }

    /// Ask the worker to exit once everything queued so far has run
    pub fn enqueue_poison_pill(&self) -> bool {
        self.queue.push(WorkItem::PoisonPill).is_ok()
    }

    /// Cancel the worker and return the jobs it never started
    ///
    /// A job that is already executing keeps running and is not returned.
    /// Safe to call after the worker has stopped, in which case nothing is returned.
    pub fn cancel_remaining(&self) -> Vec<BoxedJob> {
        let remaining = self.queue.cancel();
        if !remaining.is_empty() {
            log::debug!(
                "worker {} cancelled with {} unexecuted jobs",
                self.index,
                remaining.len()
            );
        }
        remaining
    }

    /// Whether the caller is running on this worker's own thread
    ///
    /// A worker cannot be joined from inside one of its jobs.
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Wait for the worker thread to exit
    pub fn join(&self) -> Result<()> {
        // Disconnect is the only possible outcome: nothing is ever sent.
        let _ = self.exited.recv();
        self.reap()
    }

    /// Wait up to `timeout` for the worker thread to exit
    ///
    /// Returns `true` if the thread exited within the budget.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        match self.exited.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Err(e) = self.reap() {
                    log::error!("{}", e);
                }
                true
            }
        }
    }

    fn reap(&self) -> Result<()> {
        if let Some(thread) = self.thread.lock().take() {
            thread.join().map_err(|_| {
                AffinityError::other(format!("worker {} thread panicked", self.index))
            })?;
        }
        Ok(())
    }

    /// Main worker loop
    ///
    /// Exits on the poison pill or when the queue is cancelled.
    fn run(index: usize, queue: &WorkQueue, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let worker_span = span!(Level::DEBUG, "worker", index = index);
        #[cfg(feature = "tracing")]
        let _guard = worker_span.enter();

        while let Some(item) = queue.pop() {
            match item {
                WorkItem::PoisonPill => break,
                WorkItem::Task(mut job) => {
                    #[cfg(feature = "tracing")]
                    crate::tracing::metrics::record_worker_busy(index);

                    Self::execute_job(index, &mut job, stats);

                    #[cfg(feature = "tracing")]
                    crate::tracing::metrics::record_worker_idle(index);
                }
            }
        }

        if queue.is_cancelled() {
            log::debug!("worker {} cancelled, assuming shutdown", index);
        }

        // Anything still queued here was submitted behind the poison pill.
        let dropped = queue.stop();
        if dropped > 0 {
            log::warn!(
                "worker {} stopped with {} jobs queued behind shutdown; they will not run",
                index,
                dropped
            );
        }

        log::debug!(
            "worker {} stopped: {} processed, {} failed, {} panicked",
            index,
            stats.get_jobs_processed(),
            stats.get_jobs_failed(),
            stats.get_jobs_panicked()
        );
    }

    /// Execute a single job with panic protection
    fn execute_job(index: usize, job: &mut BoxedJob, stats: &WorkerStats) {
        #[cfg(feature = "tracing")]
        let job_span = span!(Level::DEBUG, "job_execution", job_type = job.job_type());
        #[cfg(feature = "tracing")]
        let _job_guard = job_span.enter();

        let start = Instant::now();
        let panic_result = catch_unwind(AssertUnwindSafe(|| job.execute()));
        let elapsed = start.elapsed();

        match panic_result {
            Ok(Ok(())) => {
                stats.increment_processed();
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(elapsed, true);
            }
            Ok(Err(e)) => {
                log::warn!("worker {}: job {} failed: {}", index, job.job_type(), e);
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_completion(elapsed, false);
                stats.increment_failed();
            }
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                log::error!(
                    "worker {}: job {} panicked: {}",
                    index,
                    job.job_type(),
                    panic_msg
                );
                #[cfg(feature = "tracing")]
                crate::tracing::metrics::record_panic(elapsed);
                stats.increment_panicked();
            }
        }

        stats.add_processing_time(elapsed.as_micros() as u64);
    }
}
