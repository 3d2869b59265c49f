//! Affinity router and worker implementations

pub mod router;
pub mod worker;

pub use router::{AffinityRouter, AffinityStrategy, RouterConfig, ShutdownPolicy};
pub use worker::{Worker, WorkerState, WorkerStats};
