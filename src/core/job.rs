//! Job trait and related types

use crate::core::error::{AffinityError, Result};
use std::fmt;

/// A unit of work routed to a worker by affinity key
///
/// Returning an error or panicking counts as a task failure: it is logged and
/// counted by the worker, never propagated to the submitter.
pub trait Job: Send {
    /// Execute the job
    ///
    /// # Errors
    ///
    /// Returns an error if the job execution fails
    fn execute(&mut self) -> Result<()>;

    /// Get the job's type name for debugging and statistics
    fn job_type(&self) -> &str {
        "Job"
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Job({})", self.job_type())
    }
}

/// A boxed job that can be sent across threads
pub type BoxedJob = Box<dyn Job>;

/// Helper to create a job from a closure
pub struct ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    closure: Option<F>,
    name: String,
}

impl<F> ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    /// Create a new closure job
    pub fn new(closure: F) -> Self {
        Self {
            closure: Some(closure),
            name: "ClosureJob".to_string(),
        }
    }

    /// Create a new closure job with a custom name
    pub fn with_name<S: Into<String>>(closure: F, name: S) -> Self {
        Self {
            closure: Some(closure),
            name: name.into(),
        }
    }
}

impl<F> Job for ClosureJob<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn execute(&mut self) -> Result<()> {
        match self.closure.take() {
            Some(closure) => closure(),
            None => Err(AffinityError::execution(
                self.name.clone(),
                "closure already executed",
            )),
        }
    }

    fn job_type(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = Arc::clone(&runs);
        let mut job = ClosureJob::new(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(job.job_type(), "ClosureJob");
        assert!(job.execute().is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_closure_job_runs_once() {
        let mut job = ClosureJob::with_name(|| Ok(()), "Doug Glatt");
        assert!(job.execute().is_ok());

        let err = job.execute().expect_err("second execution must fail");
        assert!(matches!(err, AffinityError::ExecutionError { .. }));
        assert!(err.to_string().contains("Doug Glatt"));
    }

    #[test]
    fn test_boxed_job_debug() {
        let job: BoxedJob = Box::new(ClosureJob::with_name(|| Ok(()), "TestJob"));
        assert_eq!(format!("{:?}", job), "Job(TestJob)");
    }
}
