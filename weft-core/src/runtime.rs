//! Reactive runtime.
//!
//! The runtime owns the shared state the engine needs: the computation
//! arena, the forward dependency graph, and the active-computation stack.
//! Store reads call [`track`](Runtime::track), store writes call
//! [`trigger`](Runtime::trigger), and effects run through
//! [`run_computation`](Runtime::run_computation).
//!
//! # A computation run
//!
//! 1. Remove the computation from every forward set its previous run
//!    recorded, and clear its back-index. Conditional reads mean the
//!    dependency set can change shape between runs; stale edges must not
//!    linger or a branch that is no longer taken keeps re-triggering the
//!    computation.
//! 2. Push the computation onto the active stack.
//! 3. Run the body. Reads during the run record fresh edges.
//! 4. Pop the stack, restoring the previous frame (if any) as the active
//!    computation. The pop is performed by a drop guard, so a panicking
//!    body cannot leave reads attributed to a dead frame.
//!
//! Execution is single-threaded and synchronous throughout: every borrow of
//! the shared state is released before any user code (body or scheduler)
//! runs, which is what makes re-entrant reads and writes safe.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::trace;

use crate::context::ActiveStack;
use crate::deps::{DepGraph, DepKey};
use crate::effect::{Rerun, Scheduler};
use crate::error::{Error, Result};
use crate::id::{ComputationId, StoreId};

/// A registered computation: the type-erased runner plus bookkeeping.
struct Computation {
    /// Type-erased body. The typed value is parked in the owning effect's
    /// slot, so direct, triggered, and scheduled runs share one path.
    body: Rc<dyn Fn()>,
    /// Scheduler indirection; `None` means re-run directly on trigger.
    scheduler: Option<Scheduler>,
    /// Back-index: the `(store, field)` coordinates whose forward sets this
    /// computation was added to on its most recent run. Used only for
    /// cleanup.
    deps: SmallVec<[DepKey; 4]>,
    /// Completed runs.
    runs: u64,
}

/// Shared runtime state. All mutation goes through short-lived borrows.
#[derive(Default)]
pub(crate) struct State {
    pub(crate) graph: DepGraph,
    active: ActiveStack,
    computations: HashMap<ComputationId, Computation>,
    next_store: u64,
    next_computation: u64,
}

/// Handle to a reactive runtime. Cheap to clone; all clones share state.
///
/// Independent runtimes are fully isolated: stores and computations belong
/// to the runtime that created them.
#[derive(Clone, Default)]
pub struct Runtime {
    state: Rc<RefCell<State>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: Rc<RefCell<State>>) -> Self {
        Self { state }
    }

    pub(crate) fn downgrade(&self) -> Weak<RefCell<State>> {
        Rc::downgrade(&self.state)
    }

    pub(crate) fn allocate_store(&self) -> StoreId {
        let mut state = self.state.borrow_mut();
        state.next_store += 1;
        StoreId(state.next_store)
    }

    pub(crate) fn release_store(&self, store: StoreId) {
        self.state.borrow_mut().graph.drop_store(store);
    }

    pub(crate) fn register_computation(
        &self,
        body: Rc<dyn Fn()>,
        scheduler: Option<Scheduler>,
    ) -> ComputationId {
        let mut state = self.state.borrow_mut();
        state.next_computation += 1;
        let id = ComputationId(state.next_computation);
        state.computations.insert(
            id,
            Computation {
                body,
                scheduler,
                deps: SmallVec::new(),
                runs: 0,
            },
        );
        id
    }

    /// Records that the currently active computation (if any) read
    /// `(store, field)`. Reads outside any computation record nothing.
    pub(crate) fn track(&self, store: StoreId, field: &str) {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let Some(current) = state.active.current() else {
            return;
        };
        if state.graph.record(store, field, current) {
            let comp = state
                .computations
                .get_mut(&current)
                .expect("active computation is registered");
            comp.deps.push((store, field.to_owned()));
        }
    }

    /// Notifies every computation that depends on `(store, field)`.
    ///
    /// Iterates a snapshot of the forward set taken before any dependent
    /// runs: a re-run mutates the live set through cleanup and may write the
    /// same field again. A dependent that is currently on the active stack
    /// is skipped entirely; its in-progress run has already observed the
    /// write, and re-entering it would recurse without bound.
    pub(crate) fn trigger(&self, store: StoreId, field: &str) {
        let snapshot = self.state.borrow().graph.snapshot(store, field);
        if snapshot.is_empty() {
            return;
        }
        trace!(%store, field, dependents = snapshot.len(), "trigger");

        for id in snapshot {
            // Looked up fresh each iteration: an earlier dependent's run may
            // have disposed this one.
            let scheduler = {
                let state = self.state.borrow();
                if state.active.contains(id) {
                    continue;
                }
                match state.computations.get(&id) {
                    Some(comp) => comp.scheduler.clone(),
                    None => continue,
                }
            };
            match scheduler {
                Some(scheduler) => scheduler(Rerun::new(self.downgrade(), id)),
                None => self
                    .run_computation(id)
                    .expect("dependent existed when its scheduler slot was read"),
            }
        }
    }

    /// Runs a computation through the cleanup/push/body/pop cycle.
    pub(crate) fn run_computation(&self, id: ComputationId) -> Result<()> {
        let body = {
            let mut state = self.state.borrow_mut();
            let state = &mut *state;
            let comp = state
                .computations
                .get_mut(&id)
                .ok_or(Error::Disposed(id))?;
            // Drop the edges recorded by the previous run; the body
            // re-records the ones it still reads.
            for (store, field) in comp.deps.drain(..) {
                state.graph.remove(store, &field, id);
            }
            state.active.push(id);
            Rc::clone(&comp.body)
        };

        trace!(%id, "run");
        {
            let _guard = ActiveGuard {
                state: Rc::clone(&self.state),
                id,
            };
            (body)();
        }

        let mut state = self.state.borrow_mut();
        if let Some(comp) = state.computations.get_mut(&id) {
            comp.runs += 1;
        }
        Ok(())
    }

    /// Removes a computation: the same bidirectional cleanup as a run,
    /// without re-running. Disposing twice is a no-op.
    pub(crate) fn dispose(&self, id: ComputationId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.active.contains(id) {
            return Err(Error::DisposeWhileRunning(id));
        }
        let Some(mut comp) = state.computations.remove(&id) else {
            return Ok(());
        };
        for (store, field) in comp.deps.drain(..) {
            state.graph.remove(store, &field, id);
        }
        trace!(%id, "disposed");
        Ok(())
    }

    pub(crate) fn is_registered(&self, id: ComputationId) -> bool {
        self.state.borrow().computations.contains_key(&id)
    }

    pub(crate) fn run_count(&self, id: ComputationId) -> u64 {
        self.state
            .borrow()
            .computations
            .get(&id)
            .map(|comp| comp.runs)
            .unwrap_or(0)
    }

    pub(crate) fn dependency_count(&self, id: ComputationId) -> usize {
        self.state
            .borrow()
            .computations
            .get(&id)
            .map(|comp| comp.deps.len())
            .unwrap_or(0)
    }

    pub(crate) fn has_scheduler(&self, id: ComputationId) -> bool {
        self.state
            .borrow()
            .computations
            .get(&id)
            .map(|comp| comp.scheduler.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn depends_on(&self, id: ComputationId, store: StoreId, field: &str) -> bool {
        self.state.borrow().graph.contains(store, field, id)
    }

    /// True while some computation is executing, meaning reads are being
    /// recorded.
    pub fn is_tracking(&self) -> bool {
        !self.state.borrow().active.is_empty()
    }

    /// The computations currently recorded as dependents of
    /// `(store, field)`, in notification order. Diagnostic helper.
    pub fn dependents_of(&self, store: StoreId, field: &str) -> Vec<ComputationId> {
        self.state.borrow().graph.snapshot(store, field).into_vec()
    }
}

/// Pops the active stack when dropped, so the pop happens even when the
/// body panics.
struct ActiveGuard {
    state: Rc<RefCell<State>>,
    id: ComputationId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let popped = self.state.borrow_mut().active.pop();
        debug_assert_eq!(popped, self.id, "mismatched active-computation frame");
    }
}
