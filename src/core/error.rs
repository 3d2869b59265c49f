//! Error types for the affinity executor

/// Result type for affinity executor operations
pub type Result<T> = std::result::Result<T, AffinityError>;

/// Errors that can occur in the affinity executor
///
/// Submitting to a closed router is not an error: it is reported through the
/// boolean returned by [`AffinityRouter::submit`](crate::AffinityRouter::submit).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AffinityError {
    /// A required argument was absent
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Name of the offending argument
        argument: String,
        /// Error message
        message: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{worker_index}: {message}")]
    SpawnError {
        /// Index of the worker that failed to spawn
        worker_index: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Worker thread exited before confirming it was running
    #[error("Worker thread #{worker_index} exited before signalling startup")]
    StartupFailed {
        /// Index of the worker that never started
        worker_index: usize,
    },

    /// Job execution failed with job details
    #[error("Job execution failed ({job_type}): {message}")]
    ExecutionError {
        /// Type name of the failed job
        job_type: String,
        /// Error message
        message: String,
    },

    /// General error
    #[error("{0}")]
    Other(String),
}

impl AffinityError {
    /// Create an invalid argument error
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        AffinityError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        AffinityError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        worker_index: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        AffinityError::SpawnError {
            worker_index,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a startup failure error
    pub fn startup_failed(worker_index: usize) -> Self {
        AffinityError::StartupFailed { worker_index }
    }

    /// Create an execution error
    pub fn execution(job_type: impl Into<String>, message: impl Into<String>) -> Self {
        AffinityError::ExecutionError {
            job_type: job_type.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        AffinityError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AffinityError::invalid_argument("key", "absent");
        assert!(matches!(err, AffinityError::InvalidArgument { .. }));

        let err = AffinityError::startup_failed(2);
        assert!(matches!(err, AffinityError::StartupFailed { worker_index: 2 }));

        let err = AffinityError::execution("ClosureJob", "boom");
        assert!(matches!(err, AffinityError::ExecutionError { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = AffinityError::invalid_argument("work", "Cannot execute absent work for key hockey");
        assert_eq!(
            err.to_string(),
            "Invalid argument 'work': Cannot execute absent work for key hockey"
        );

        let err = AffinityError::invalid_config("num_workers", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'num_workers': must be greater than 0"
        );
    }

    #[test]
    fn test_spawn_error_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::WouldBlock, "no threads left");
        let err = AffinityError::spawn_with_source(5, "Cannot create thread", io_err);

        assert!(matches!(err, AffinityError::SpawnError { .. }));
        assert!(err.to_string().contains("worker thread #5"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
