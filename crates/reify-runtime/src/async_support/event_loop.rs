//! Single-threaded microtask queue

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A unit of deferred work
pub type Microtask = Box<dyn FnOnce(&Runtime) + Send>;

/// FIFO queue of microtasks
#[derive(Default)]
pub struct EventLoop {
    queue: Mutex<VecDeque<Microtask>>,
    executed: AtomicU64,
}

impl EventLoop {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued microtasks
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Total microtasks executed so far
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    fn push(&self, task: Microtask) {
        self.queue.lock().push_back(task);
    }

    fn pop(&self) -> Option<Microtask> {
        self.queue.lock().pop_front()
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .field("executed", &self.executed())
            .finish()
    }
}

impl Runtime {
    /// Queue `task` to run after the current synchronous work
    pub fn schedule_microtask<F>(&self, task: F)
    where
        F: FnOnce(&Runtime) + Send + 'static,
    {
        self.event_loop.push(Box::new(task));
    }

    /// Number of queued microtasks
    pub fn pending_microtasks(&self) -> usize {
        self.event_loop.pending()
    }

    /// Run microtasks until the queue is empty, returning how many ran
    ///
    /// Tasks queued while draining run in the same call. Fails with a
    /// `StateError` when the configured budget is exhausted first; the
    /// remaining tasks stay queued.
    pub fn run_until_idle(&self) -> RtResult<usize> {
        let budget = self.options().microtask_budget;
        let mut ran = 0;
        loop {
            if budget.map_or(false, |b| ran >= b) && self.event_loop.pending() > 0 {
                return Err(RuntimeError::State(format!(
                    "microtask budget of {} exhausted",
                    ran
                )));
            }
            let Some(task) = self.event_loop.pop() else {
                break;
            };
            tracing::trace!(ran, "running microtask");
            task(self);
            self.event_loop.executed.fetch_add(1, Ordering::Relaxed);
            ran += 1;
        }
        Ok(ran)
    }
}
