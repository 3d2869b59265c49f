//! Per-worker work queues.
//!
//! Every worker owns exactly one [`WorkQueue`]: many submitting threads push
//! into it, the worker's own thread is the only consumer. Items are
//! [`WorkItem`]s, which are either a real task or the poison pill used to ask a
//! worker to drain what it has and then stop.
//!
//! The queue has three terminal-ish flags, all guarded by the same lock as the
//! items themselves:
//!
//! - **cancelled**: set by [`WorkQueue::cancel`]. Pops stop returning items and
//!   the still-queued tasks are handed back to the canceller.
//! - **stopped**: set by the consumer thread on exit via [`WorkQueue::stop`].
//!   After this point every operation is a no-op.

mod work_queue;

pub use work_queue::WorkQueue;

use crate::core::BoxedJob;

/// An entry in a worker queue.
#[derive(Debug)]
pub enum WorkItem {
    /// A job to execute.
    Task(BoxedJob),
    /// Sentinel telling the worker to exit once everything queued before it ran.
    PoisonPill,
}

impl WorkItem {
    /// Returns `true` for the poison pill sentinel.
    pub fn is_poison_pill(&self) -> bool {
        matches!(self, WorkItem::PoisonPill)
    }

    /// Returns the job carried by this item, if any.
    pub fn into_job(self) -> Option<BoxedJob> {
        match self {
            WorkItem::Task(job) => Some(job),
            WorkItem::PoisonPill => None,
        }
    }
}

/// Errors returned when pushing into a queue that no longer accepts work.
///
/// The rejected item is handed back to the caller.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue was cancelled during shutdown.
    #[error("queue has been cancelled")]
    Cancelled(WorkItem),
    /// The consuming worker has exited.
    #[error("queue consumer has stopped")]
    Stopped(WorkItem),
}

impl QueueError {
    /// Recover the rejected item.
    pub fn into_item(self) -> WorkItem {
        match self {
            QueueError::Cancelled(item) | QueueError::Stopped(item) => item,
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;
