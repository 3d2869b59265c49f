//! Unbounded FIFO queue with a cancellable blocking pop.

use super::{QueueError, QueueResult, WorkItem};
use crate::core::BoxedJob;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

struct QueueState {
    items: VecDeque<WorkItem>,
    cancelled: bool,
    stopped: bool,
}

/// A multi-producer, single-consumer FIFO queue whose blocking pop can be
/// aborted by cancellation.
///
/// The queue is unbounded. The capacity passed to
/// [`with_capacity`](Self::with_capacity) only pre-allocates storage.
///
/// # Example
///
/// ```rust
/// use affinity_executor::core::ClosureJob;
/// use affinity_executor::queue::{WorkItem, WorkQueue};
///
/// let queue = WorkQueue::new();
/// queue.push(WorkItem::Task(Box::new(ClosureJob::new(|| Ok(()))))).unwrap();
/// queue.push(WorkItem::PoisonPill).unwrap();
///
/// assert!(!queue.pop().unwrap().is_poison_pill());
/// assert!(queue.pop().unwrap().is_poison_pill());
/// ```
pub struct WorkQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl WorkQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates a new queue with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                cancelled: false,
                stopped: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends an item to the tail of the queue. Never blocks on capacity.
    ///
    /// # Errors
    ///
    /// Hands the item back if the queue was cancelled or its consumer stopped.
    pub fn push(&self, item: WorkItem) -> QueueResult<()> {
        {
            let mut state = self.state.lock();
            if state.stopped {
                return Err(QueueError::Stopped(item));
            }
            if state.cancelled {
                return Err(QueueError::Cancelled(item));
            }
            state.items.push_back(item);
        }

        self.available.notify_one();
        Ok(())
    }

    /// Blocks until the head of the queue is available and removes it.
    ///
    /// Returns `None` as soon as the queue is cancelled or stopped, even if
    /// items remain.
    pub fn pop(&self) -> Option<WorkItem> {
        let mut state = self.state.lock();

        loop {
            if state.cancelled || state.stopped {
                return None;
            }
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            self.available.wait(&mut state);
        }
    }

    /// Cancels the queue and returns the tasks that were never dequeued, in
    /// queue order.
    ///
    /// Idempotent. Once the consumer has stopped this returns an empty vector.
    pub fn cancel(&self) -> Vec<BoxedJob> {
        let remaining = {
            let mut state = self.state.lock();
            if state.stopped {
                return Vec::new();
            }
            state.cancelled = true;
            std::mem::take(&mut state.items)
        };

        self.available.notify_all();
        remaining.into_iter().filter_map(WorkItem::into_job).collect()
    }

    /// Marks the consumer as gone and releases anything still queued.
    ///
    /// Returns how many tasks were dropped without running.
    pub fn stop(&self) -> usize {
        let leftover = {
            let mut state = self.state.lock();
            state.stopped = true;
            std::mem::take(&mut state.items)
        };

        self.available.notify_all();
        leftover.iter().filter(|item| !item.is_poison_pill()).count()
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Whether the consumer has stopped.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Number of queued items, including a pending poison pill.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WorkQueue")
            .field("len", &state.items.len())
            .field("cancelled", &state.cancelled)
            .field("stopped", &state.stopped)
            .finish()
    }
}
