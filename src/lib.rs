//! # Affinity Executor
//!
//! A fixed-size pool of single-threaded workers that routes each unit of work
//! to a worker chosen by an affinity key.
//!
//! ## Features
//!
//! - **Per-key serialization**: all work for one key runs on one thread, in submission order
//! - **Parallelism across keys**: different keys spread over the worker set
//! - **Two strategies**: hash-based or round-robin assignment of new keys
//! - **Three shutdown modes**: drain everything, drain within a deadline, or cancel at once,
//!   always handing back the jobs that never started
//! - **Failure isolation**: a job that errors or panics never takes its worker down
//!
//! ## Quick Start
//!
//! ```rust
//! use affinity_executor::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let router = AffinityRouter::new(AffinityStrategy::Hash, 4)?;
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! for i in 0..10 {
//!     let counter = Arc::clone(&counter);
//!     router.execute(format!("account-{}", i % 3), move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     });
//! }
//!
//! // Wait for every queued job, then stop the workers
//! let unexecuted = router.shutdown(ShutdownPolicy::WaitIndefinitely);
//! assert!(unexecuted.is_empty());
//! assert_eq!(counter.load(Ordering::SeqCst), 10);
//! # Ok(())
//! # }
//! ```
//!
//! ## Round-Robin Assignment
//!
//! ```rust
//! use affinity_executor::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let router = AffinityRouter::new(AffinityStrategy::RoundRobin, 3)?;
//! for key in ["hockey", "baseball", "football", "golf"] {
//!     router.execute(key, || Ok(()));
//! }
//!
//! assert_eq!(router.worker_for(&"hockey"), Some(0));
//! assert_eq!(router.worker_for(&"golf"), Some(0));
//! assert_eq!(router.round(), 0);
//! # router.shutdown(0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Shutdown
//!
//! [`AffinityRouter::shutdown`] accepts a [`ShutdownPolicy`] or an integer
//! number of milliseconds: `0` waits indefinitely, a positive value is a
//! deadline shared by all workers, a negative value cancels immediately.
//!
//! ```rust
//! use affinity_executor::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let router = AffinityRouter::new(AffinityStrategy::Hash, 2)?;
//! router.execute("key", || Ok(()));
//!
//! let unexecuted: Vec<BoxedJob> = router.shutdown(-1);
//! println!("{} jobs never started", unexecuted.len());
//!
//! // Closed routers reject work without failing
//! assert!(!router.execute("key", || Ok(())));
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom Jobs
//!
//! ```rust
//! use affinity_executor::prelude::*;
//!
//! struct Deposit {
//!     account: String,
//!     amount: u64,
//! }
//!
//! impl Job for Deposit {
//!     fn execute(&mut self) -> Result<()> {
//!         println!("{} += {}", self.account, self.amount);
//!         Ok(())
//!     }
//!
//!     fn job_type(&self) -> &str {
//!         "Deposit"
//!     }
//! }
//!
//! # fn main() -> Result<()> {
//! let router = AffinityRouter::new(AffinityStrategy::Hash, 2)?;
//! router.submit(
//!     "acct-1".to_string(),
//!     Deposit {
//!         account: "acct-1".to_string(),
//!         amount: 5,
//!     },
//! );
//! # router.shutdown(0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod tracing;

pub use crate::core::{AffinityError, BoxedJob, ClosureJob, Job, Result};
pub use crate::pool::{
    AffinityRouter, AffinityStrategy, RouterConfig, ShutdownPolicy, Worker, WorkerState,
    WorkerStats,
};
