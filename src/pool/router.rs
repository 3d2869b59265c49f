//! Affinity router implementation

use crate::core::{AffinityError, BoxedJob, ClosureJob, Job, Result};
use crate::pool::worker::{Worker, WorkerStats};
use crate::tracing::TracedJob;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How long dropping an open router waits for queued work before cancelling it.
const DROP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Policy used to pick a worker for a key seen for the first time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityStrategy {
    /// `hash(key) % num_workers`, computed without locking
    #[default]
    Hash,
    /// Sequential wrapping allocation: the first new key gets worker 0, the next worker 1, ...
    RoundRobin,
}

impl AffinityStrategy {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            AffinityStrategy::Hash => "hash",
            AffinityStrategy::RoundRobin => "round_robin",
        }
    }
}

/// What [`AffinityRouter::shutdown`] does with work that has not run yet
///
/// Integers convert with the millisecond convention: `0` waits indefinitely, a
/// positive value waits that many milliseconds, a negative value cancels at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Let every worker drain its queue, however long that takes
    WaitIndefinitely,
    /// Let workers drain within one budget shared across all of them, then
    /// cancel whatever is still queued
    WaitFor(Duration),
    /// Cancel every worker without waiting
    CancelImmediately,
}

impl From<i64> for ShutdownPolicy {
    fn from(millis: i64) -> Self {
        match millis {
            0 => ShutdownPolicy::WaitIndefinitely,
            m if m > 0 => ShutdownPolicy::WaitFor(Duration::from_millis(m as u64)),
            _ => ShutdownPolicy::CancelImmediately,
        }
    }
}

impl From<i32> for ShutdownPolicy {
    fn from(millis: i32) -> Self {
        ShutdownPolicy::from(i64::from(millis))
    }
}

/// Configuration for an affinity router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Strategy for assigning new keys to workers
    pub strategy: AffinityStrategy,
    /// Number of worker threads
    pub num_workers: usize,
    /// Thread name prefix; workers are named `{prefix}-{index}`
    pub thread_name_prefix: String,
    /// Storage pre-allocated for each worker queue.
    ///
    /// Queues are unbounded regardless of this value; it is not an admission limit.
    pub queue_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            strategy: AffinityStrategy::default(),
            num_workers: num_cpus::get(),
            thread_name_prefix: "affinity-worker".to_string(),
            queue_capacity: 0,
        }
    }
}

impl RouterConfig {
    /// Create a new configuration (0 workers = number of CPUs)
    #[must_use]
    pub fn new(strategy: AffinityStrategy, num_workers: usize) -> Self {
        let defaults = Self::default();
        Self {
            strategy,
            num_workers: if num_workers == 0 {
                defaults.num_workers
            } else {
                num_workers
            },
            ..defaults
        }
    }

    /// Set the affinity strategy
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_strategy(mut self, strategy: AffinityStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the number of workers
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_num_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the per-worker queue pre-allocation
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(AffinityError::invalid_config(
                "num_workers",
                "Number of workers must be greater than 0",
            ));
        }
        if self.thread_name_prefix.contains('\0') {
            return Err(AffinityError::invalid_config(
                "thread_name_prefix",
                "Thread names cannot contain NUL bytes",
            ));
        }
        Ok(())
    }
}

/// A fixed set of single-threaded workers with per-key routing
///
/// Every job submitted for a key runs on the worker that key was first
/// assigned to, in submission order. Keys are assigned once and never move.
/// The only relaxation: two submissions racing for a key nobody has used yet
/// have no defined order between them.
///
/// # Closing
///
/// [`shutdown`](Self::shutdown) swaps the worker set for an empty one. Any
/// submission that observes the empty set returns `false`.
pub struct AffinityRouter<K> {
    config: RouterConfig,
    workers: RwLock<Arc<[Worker]>>,
    key_mapping: DashMap<K, usize>,
    round: Mutex<isize>,
    shutdown_lock: Mutex<()>,
    stats: Vec<Arc<WorkerStats>>,
    total_jobs_submitted: AtomicU64,
    hasher: BuildHasherDefault<DefaultHasher>,
}

impl<K: Hash + Eq> std::fmt::Debug for AffinityRouter<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityRouter")
            .field("config", &self.config)
            .field("closed", &self.is_closed())
            .field("round", &self.round())
            .field("mapped_keys", &self.key_mapping.len())
            .field(
                "total_jobs_submitted",
                &self.total_jobs_submitted.load(Ordering::Relaxed),
            )
            .finish()
    }
}

impl<K: Hash + Eq> AffinityRouter<K> {
    /// Create a router with `num_workers` workers (0 = number of CPUs)
    pub fn new(strategy: AffinityStrategy, num_workers: usize) -> Result<Self> {
        Self::with_config(RouterConfig::new(strategy, num_workers))
    }

    /// Create a router with custom configuration
    ///
    /// Every worker thread is running when this returns, so the router can be
    /// submitted to immediately.
    pub fn with_config(config: RouterConfig) -> Result<Self> {
        config.validate()?;

        let mut workers = Vec::with_capacity(config.num_workers);
        let mut stats = Vec::with_capacity(config.num_workers);
        for index in 0..config.num_workers {
            let worker_stats = Arc::new(WorkerStats::new());
            let thread_name = format!("{}-{}", config.thread_name_prefix, index);
            match Worker::new(
                index,
                thread_name,
                config.queue_capacity,
                Arc::clone(&worker_stats),
            ) {
                Ok(worker) => {
                    workers.push(worker);
                    stats.push(worker_stats);
                }
                Err(e) => {
                    for worker in &workers {
                        worker.cancel_remaining();
                    }
                    return Err(e);
                }
            }
        }

        log::info!(
            "affinity router started with {} workers ({} strategy)",
            config.num_workers,
            config.strategy.name()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_router_start(config.num_workers, config.strategy.name());

        Ok(Self {
            config,
            workers: RwLock::new(Arc::from(workers)),
            key_mapping: DashMap::new(),
            round: Mutex::new(-1),
            shutdown_lock: Mutex::new(()),
            stats,
            total_jobs_submitted: AtomicU64::new(0),
            hasher: BuildHasherDefault::default(),
        })
    }

    /// Submit a job for `key`
    ///
    /// Returns `false` if the router is closed or the target worker has already
    /// been cancelled by an in-progress shutdown. The job is dropped in that case.
    pub fn submit<J: Job + 'static>(&self, key: K, job: J) -> bool {
        self.dispatch(key, Box::new(job))
    }

    /// Submit a closure as a job for `key`
    pub fn execute<F>(&self, key: K, f: F) -> bool
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.submit(key, ClosureJob::new(f))
    }

    /// Submit a job that runs inside the caller's current tracing span
    pub fn submit_traced<J: Job + 'static>(&self, key: K, job: J) -> bool {
        self.submit(key, TracedJob::new(job))
    }

    /// Submit with arguments that may be absent
    ///
    /// # Errors
    ///
    /// `AffinityError::InvalidArgument` if `key` or `job` is `None`. Nothing is
    /// mutated in that case.
    pub fn submit_checked(&self, key: Option<K>, job: Option<BoxedJob>) -> Result<bool> {
        let key = key.ok_or_else(|| {
            AffinityError::invalid_argument("key", "Cannot execute work for an absent key")
        })?;
        let job = job.ok_or_else(|| {
            AffinityError::invalid_argument("work", "Cannot execute absent work")
        })?;
        Ok(self.dispatch(key, job))
    }

    /// Worker index `key` is bound to, if it has been seen
    pub fn worker_for(&self, key: &K) -> Option<usize> {
        self.key_mapping.get(key).map(|index| *index)
    }

    /// Number of keys bound to a worker
    pub fn mapped_keys(&self) -> usize {
        self.key_mapping.len()
    }

    fn dispatch(&self, key: K, job: BoxedJob) -> bool {
        // Held until the job is queued so that shutdown's swap waits for us and
        // every accepted job lands ahead of the poison pill.
        let workers = self.workers.read();
        if workers.is_empty() {
            return false;
        }

        let index = self.resolve(key, workers.len());
        let worker = &workers[index];
        let accepted = worker.enqueue(job);
        if accepted {
            self.total_jobs_submitted.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            crate::tracing::metrics::record_submission(index, worker.queue_len());
        }
        accepted
    }

    /// Resolve `key` to a worker index, binding it on first sight.
    fn resolve(&self, key: K, num_workers: usize) -> usize {
        if let Some(index) = self.worker_for(&key) {
            return index;
        }

        match self.config.strategy {
            // Racing callers compute the same index; whichever insert lands first wins.
            AffinityStrategy::Hash => {
                let index = (self.hasher.hash_one(&key) % num_workers as u64) as usize;
                *self.key_mapping.entry(key).or_insert(index)
            }
            // The round advances only for the caller that actually inserts the key.
            AffinityStrategy::RoundRobin => {
                let mut round = self.round.lock();
                *self.key_mapping.entry(key).or_insert_with(|| {
                    *round = if *round + 1 >= num_workers as isize {
                        0
                    } else {
                        *round + 1
                    };
                    *round as usize
                })
            }
        }
    }
}

impl<K> AffinityRouter<K> {
    /// Shut the router down and return the jobs that never started
    ///
    /// Submission is disabled before any worker is touched. Then, per worker in
    /// index order:
    ///
    /// - [`WaitIndefinitely`](ShutdownPolicy::WaitIndefinitely): enqueue the
    ///   poison pill and join.
    /// - [`WaitFor`](ShutdownPolicy::WaitFor): enqueue the poison pill and join
    ///   with what is left of the budget; time spent on earlier workers is
    ///   subtracted. A worker that misses the deadline is cancelled and its
    ///   queued jobs are returned.
    /// - [`CancelImmediately`](ShutdownPolicy::CancelImmediately): cancel and
    ///   collect queued jobs.
    ///
    /// A job already executing when its worker is cancelled keeps running; it
    /// is neither interrupted nor returned. Calling this on a closed router
    /// returns an empty vector.
    ///
    /// When called from inside a job (including by dropping the last handle
    /// to the router there), the calling worker is never joined. Under
    /// `WaitFor` its queued jobs are cancelled and returned; under
    /// `WaitIndefinitely` it drains them after the calling job returns.
    pub fn shutdown(&self, policy: impl Into<ShutdownPolicy>) -> Vec<BoxedJob> {
        let policy = policy.into();
        let _shutdown_guard = self.shutdown_lock.lock();

        let workers = {
            let mut slot = self.workers.write();
            if slot.is_empty() {
                return Vec::new();
            }
            let closed: Arc<[Worker]> = Arc::new([]);
            std::mem::replace(&mut *slot, closed)
        };

        log::debug!("shutting down {} workers: {:?}", workers.len(), policy);

        let mut unexecuted = Vec::new();
        match policy {
            ShutdownPolicy::WaitFor(budget) => {
                let started = Instant::now();
                for worker in workers.iter() {
                    if worker.is_current_thread() {
                        unexecuted.extend(worker.cancel_remaining());
                        continue;
                    }
                    worker.enqueue_poison_pill();
                    let remaining = budget.saturating_sub(started.elapsed());
                    if !worker.join_timeout(remaining) {
                        log::debug!(
                            "worker {} missed the shutdown deadline, cancelling",
                            worker.index()
                        );
                        unexecuted.extend(worker.cancel_remaining());
                    }
                }
            }
            ShutdownPolicy::WaitIndefinitely => {
                for worker in workers.iter() {
                    worker.enqueue_poison_pill();
                    if worker.is_current_thread() {
                        // Drains once the calling job returns.
                        continue;
                    }
                    if let Err(e) = worker.join() {
                        log::error!("{}", e);
                    }
                }
            }
            ShutdownPolicy::CancelImmediately => {
                for worker in workers.iter() {
                    unexecuted.extend(worker.cancel_remaining());
                }
            }
        }

        log::info!(
            "affinity router shut down: {} processed, {} unexecuted",
            self.total_jobs_processed(),
            unexecuted.len()
        );
        #[cfg(feature = "tracing")]
        crate::tracing::metrics::record_router_shutdown(
            self.total_jobs_processed(),
            unexecuted.len(),
        );

        unexecuted
    }

    /// Current round-robin counter; -1 until the first key is assigned
    ///
    /// Exposed for diagnostics only.
    pub fn round(&self) -> isize {
        *self.round.lock()
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    pub fn is_closed(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// Get the number of workers the router was built with
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Get the affinity strategy
    pub fn strategy(&self) -> AffinityStrategy {
        self.config.strategy
    }

    /// Get the router configuration
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Get total number of jobs accepted
    pub fn total_jobs_submitted(&self) -> u64 {
        self.total_jobs_submitted.load(Ordering::Relaxed)
    }

    /// Get statistics for all workers, indexed by worker
    ///
    /// Statistics remain readable after shutdown.
    pub fn get_stats(&self) -> Vec<Arc<WorkerStats>> {
        self.stats.iter().map(Arc::clone).collect()
    }

    /// Get total jobs processed across all workers
    pub fn total_jobs_processed(&self) -> u64 {
        self.stats.iter().map(|s| s.get_jobs_processed()).sum()
    }

    /// Get total jobs failed across all workers
    pub fn total_jobs_failed(&self) -> u64 {
        self.stats.iter().map(|s| s.get_jobs_failed()).sum()
    }

    /// Get total jobs panicked across all workers
    pub fn total_jobs_panicked(&self) -> u64 {
        self.stats.iter().map(|s| s.get_jobs_panicked()).sum()
    }
}

impl<K> Drop for AffinityRouter<K> {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        let abandoned = self.shutdown(ShutdownPolicy::WaitFor(DROP_SHUTDOWN_TIMEOUT));
        if !abandoned.is_empty() {
            log::warn!(
                "affinity router dropped with {} unexecuted jobs",
                abandoned.len()
            );
        }
    }
}
