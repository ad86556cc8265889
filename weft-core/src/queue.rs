//! A deduplicating job queue for scheduled effects.
//!
//! Writes in a burst enqueue each affected computation once; a later
//! [`flush`](EffectQueue::flush) runs the distinct jobs in enqueue order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::effect::{Rerun, Scheduler};
use crate::id::ComputationId;

/// A queue of pending re-runs, deduplicated by computation. Clones share
/// the same queue.
#[derive(Clone, Default)]
pub struct EffectQueue {
    inner: Rc<RefCell<QueueState>>,
}

#[derive(Default)]
struct QueueState {
    jobs: IndexMap<ComputationId, Rerun>,
    flushing: bool,
}

impl EffectQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scheduler that parks re-runs here instead of executing them.
    pub fn scheduler(&self) -> Scheduler {
        let inner = Rc::clone(&self.inner);
        Rc::new(move |rerun| {
            inner.borrow_mut().jobs.entry(rerun.id()).or_insert(rerun);
        })
    }

    /// Runs every pending job in enqueue order. Jobs enqueued while
    /// flushing are drained in the same pass; a flush from inside a job is
    /// a no-op.
    ///
    /// A panic in a job propagates to the caller; the queue stays usable.
    pub fn flush(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.flushing {
                return;
            }
            inner.flushing = true;
        }
        debug!(jobs = self.len(), "flushing effect queue");
        // The flag clears on unwind too, so a panicking job cannot leave
        // the queue refusing every later flush.
        let _guard = FlushGuard {
            inner: Rc::clone(&self.inner),
        };
        while let Some(job) = self.next_job() {
            job.run();
        }
    }

    fn next_job(&self) -> Option<Rerun> {
        self.inner
            .borrow_mut()
            .jobs
            .shift_remove_index(0)
            .map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().jobs.is_empty()
    }

    /// Discards pending jobs without running them.
    pub fn clear(&self) {
        self.inner.borrow_mut().jobs.clear();
    }
}

/// Clears the flushing flag when the drain loop exits, normally or by
/// panic.
struct FlushGuard {
    inner: Rc<RefCell<QueueState>>,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.inner.borrow_mut().flushing = false;
    }
}

impl fmt::Debug for EffectQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EffectQueue")
            .field("jobs", &inner.jobs.len())
            .field("flushing", &inner.flushing)
            .finish()
    }
}
