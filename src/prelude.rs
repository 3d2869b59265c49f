//! Convenient re-exports for common types and traits

pub use crate::core::{AffinityError, BoxedJob, ClosureJob, Job, Result};
pub use crate::pool::{AffinityRouter, AffinityStrategy, RouterConfig, ShutdownPolicy, WorkerStats};
