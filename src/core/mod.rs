//! Core types and traits for the affinity executor

pub mod error;
pub mod job;

pub use error::{AffinityError, Result};
pub use job::{BoxedJob, ClosureJob, Job};
