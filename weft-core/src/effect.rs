//! Effects: re-runnable computations with automatic dependency cleanup.
//!
//! [`Effect::new`] wraps a closure in a runner managed by the runtime. The
//! runner re-records its dependencies on every run, so a body with
//! conditional reads sheds the edges of branches it no longer takes
//! ("branch switching"). An effect constructed with a scheduler is not
//! re-run directly when a dependency changes: the scheduler receives a
//! [`Rerun`] and decides when, or whether, the run happens. Batching
//! queues and computed cells are built on that hook.
//!
//! Dropping an `Effect` handle does not dispose the computation; it stays
//! registered and keeps reacting to its dependencies. Call
//! [`Effect::dispose`] to remove it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Result;
use crate::id::{ComputationId, StoreId};
use crate::runtime::{Runtime, State};

/// Scheduler callback: receives the pending re-run instead of the engine
/// executing it synchronously.
pub type Scheduler = Rc<dyn Fn(Rerun)>;

/// A pending re-run of a computation, handed to schedulers.
///
/// Holds the runtime weakly: a job parked in an external queue neither
/// keeps the engine alive nor breaks when the engine or the computation is
/// gone. Running a stale job is a no-op.
#[derive(Clone)]
pub struct Rerun {
    state: Weak<RefCell<State>>,
    id: ComputationId,
}

impl Rerun {
    pub(crate) fn new(state: Weak<RefCell<State>>, id: ComputationId) -> Self {
        Self { state, id }
    }

    /// The computation this job would re-run. Queues use this to
    /// de-duplicate.
    pub fn id(&self) -> ComputationId {
        self.id
    }

    /// Executes the re-run now. Returns false if the runtime or the
    /// computation no longer exists.
    pub fn run(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        Runtime::from_state(state).run_computation(self.id).is_ok()
    }
}

impl fmt::Debug for Rerun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rerun").field(&self.id).finish()
    }
}

/// Options for [`Effect::with_options`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// When set, a trigger hands the re-run to this callback instead of
    /// executing it synchronously.
    pub scheduler: Option<Scheduler>,
    /// When true, the effect does not run at construction; the first run
    /// happens through [`Effect::run`] or a trigger.
    pub lazy: bool,
}

/// A re-runnable computation handle. Clones share the same computation.
pub struct Effect<T: Clone + 'static> {
    runtime: Runtime,
    id: ComputationId,
    /// Latest value produced by the body. The type-erased runner in the
    /// arena writes it, so direct, triggered, and scheduled runs all share
    /// one path.
    slot: Rc<RefCell<Option<T>>>,
}

impl<T: Clone + 'static> Effect<T> {
    /// Registers `body` and runs it once to establish initial dependencies.
    pub fn new<F>(runtime: &Runtime, body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(runtime, body, EffectOptions::default())
    }

    /// Registers `body` without running it.
    pub fn lazy<F>(runtime: &Runtime, body: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        Self::with_options(
            runtime,
            body,
            EffectOptions {
                lazy: true,
                ..EffectOptions::default()
            },
        )
    }

    /// Registers `body` with explicit options.
    pub fn with_options<F>(runtime: &Runtime, body: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let runner = {
            let slot = Rc::clone(&slot);
            move || {
                let value = body();
                *slot.borrow_mut() = Some(value);
            }
        };

        let effect = Self {
            runtime: runtime.clone(),
            id: runtime.register_computation(Rc::new(runner), options.scheduler),
            slot,
        };
        if !options.lazy {
            effect
                .runtime
                .run_computation(effect.id)
                .expect("a freshly registered computation can run");
        }
        effect
    }

    pub fn id(&self) -> ComputationId {
        self.id
    }

    /// Forces a run and returns the value the body produced.
    pub fn run(&self) -> Result<T> {
        self.runtime.run_computation(self.id)?;
        Ok(self
            .slot
            .borrow()
            .clone()
            .expect("a completed run leaves a value in the slot"))
    }

    /// The value from the most recent completed run, if any.
    pub fn last_value(&self) -> Option<T> {
        self.slot.borrow().clone()
    }

    /// Removes the effect: the same bidirectional cleanup as a run, without
    /// re-running. Fails with
    /// [`Error::DisposeWhileRunning`](crate::Error::DisposeWhileRunning)
    /// when called from inside the effect's own body.
    pub fn dispose(&self) -> Result<()> {
        self.runtime.dispose(self.id)
    }

    pub fn is_disposed(&self) -> bool {
        !self.runtime.is_registered(self.id)
    }

    /// Completed runs.
    pub fn run_count(&self) -> u64 {
        self.runtime.run_count(self.id)
    }

    /// Edges recorded by the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.runtime.dependency_count(self.id)
    }

    /// Whether the most recent run read `(store, field)`.
    pub fn depends_on(&self, store: StoreId, field: &str) -> bool {
        self.runtime.depends_on(self.id, store, field)
    }

    /// Whether triggers route through a scheduler instead of re-running
    /// directly.
    pub fn has_scheduler(&self) -> bool {
        self.runtime.has_scheduler(self.id)
    }
}

impl<T: Clone + 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            runtime: self.runtime.clone(),
            id: self.id,
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<T: Clone + 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::Store;
    use std::cell::Cell;

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let count = Rc::new(Cell::new(0));

        let effect = {
            let count = Rc::clone(&count);
            Effect::new(&rt, move || count.set(count.get() + 1))
        };

        assert_eq!(count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let rt = Runtime::new();
        let count = Rc::new(Cell::new(0));

        let effect = {
            let count = Rc::clone(&count);
            Effect::lazy(&rt, move || count.set(count.get() + 1))
        };
        assert_eq!(count.get(), 0);
        assert_eq!(effect.last_value(), None);

        effect.run().unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn run_returns_the_body_value() {
        let rt = Runtime::new();
        let effect = Effect::lazy(&rt, || 41 + 1);

        assert_eq!(effect.run(), Ok(42));
        assert_eq!(effect.last_value(), Some(42));
    }

    #[test]
    fn writes_rerun_readers_once_per_write() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("a", 1)]);
        let runs = Rc::new(Cell::new(0));

        let _effect = {
            let store = store.clone();
            let runs = Rc::clone(&runs);
            Effect::new(&rt, move || {
                store.get("a");
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        store.set("a", 2);
        assert_eq!(runs.get(), 2);

        store.set("a", 3);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn unread_fields_trigger_nothing() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("a", 1), ("g", 0)]);
        let runs = Rc::new(Cell::new(0));

        let _effect = {
            let store = store.clone();
            let runs = Rc::clone(&runs);
            Effect::new(&rt, move || {
                store.get("a");
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        store.set("g", 99);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn branch_switching_drops_stale_edges() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("flag", 1), ("a", 10), ("b", 20)]);
        let runs = Rc::new(Cell::new(0));

        let effect = {
            let store = store.clone();
            let runs = Rc::clone(&runs);
            Effect::new(&rt, move || {
                runs.set(runs.get() + 1);
                if store.get("flag") == Some(1) {
                    store.get("a");
                } else {
                    store.get("b");
                }
            })
        };
        assert_eq!(runs.get(), 1);
        assert!(effect.depends_on(store.id(), "a"));
        assert!(!effect.depends_on(store.id(), "b"));

        store.set("a", 11);
        assert_eq!(runs.get(), 2);

        // Switch to the other branch.
        store.set("flag", 0);
        assert_eq!(runs.get(), 3);
        assert!(!effect.depends_on(store.id(), "a"));
        assert!(effect.depends_on(store.id(), "b"));

        // The abandoned branch no longer triggers.
        store.set("a", 12);
        assert_eq!(runs.get(), 3);

        store.set("b", 21);
        assert_eq!(runs.get(), 4);
    }

    #[test]
    fn self_incrementing_effect_terminates() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("n", 0)]);
        let runs = Rc::new(Cell::new(0));

        let effect = {
            let store = store.clone();
            let runs = Rc::clone(&runs);
            Effect::new(&rt, move || {
                runs.set(runs.get() + 1);
                let n = store.get("n").unwrap_or(0);
                store.set("n", n + 1);
            })
        };

        // The initial run incremented once; its own write did not re-enter.
        assert_eq!(runs.get(), 1);
        assert_eq!(store.get_untracked("n"), Some(1));

        // One external write, one re-run.
        store.set("n", 10);
        assert_eq!(runs.get(), 2);
        assert_eq!(store.get_untracked("n"), Some(11));
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn scheduler_defers_reruns() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("a", 1)]);
        let seen = Rc::new(Cell::new(0));
        let jobs: Rc<RefCell<Vec<Rerun>>> = Rc::new(RefCell::new(Vec::new()));

        let scheduler: Scheduler = {
            let jobs = Rc::clone(&jobs);
            Rc::new(move |rerun| jobs.borrow_mut().push(rerun))
        };
        let effect = {
            let store = store.clone();
            let seen = Rc::clone(&seen);
            Effect::with_options(
                &rt,
                move || seen.set(store.get("a").unwrap_or(0)),
                EffectOptions {
                    scheduler: Some(scheduler),
                    lazy: false,
                },
            )
        };
        assert!(effect.has_scheduler());
        assert_eq!(seen.get(), 1);

        // The write is not applied to the effect synchronously.
        store.set("a", 5);
        assert_eq!(seen.get(), 1);
        assert_eq!(jobs.borrow().len(), 1);

        // Running the queued job catches up to the same state an
        // immediate run would have produced.
        let job = jobs.borrow_mut().pop().unwrap();
        assert!(job.run());
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn queued_job_for_a_disposed_effect_is_a_no_op() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("a", 1)]);
        let jobs: Rc<RefCell<Vec<Rerun>>> = Rc::new(RefCell::new(Vec::new()));

        let scheduler: Scheduler = {
            let jobs = Rc::clone(&jobs);
            Rc::new(move |rerun| jobs.borrow_mut().push(rerun))
        };
        let effect = {
            let store = store.clone();
            Effect::with_options(
                &rt,
                move || {
                    store.get("a");
                },
                EffectOptions {
                    scheduler: Some(scheduler),
                    lazy: false,
                },
            )
        };

        store.set("a", 2);
        effect.dispose().unwrap();

        let job = jobs.borrow_mut().pop().unwrap();
        assert!(!job.run());
    }

    #[test]
    fn disposed_effect_stops_reacting() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("a", 1)]);
        let runs = Rc::new(Cell::new(0));

        let effect = {
            let store = store.clone();
            let runs = Rc::clone(&runs);
            Effect::new(&rt, move || {
                store.get("a");
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        effect.dispose().unwrap();
        assert!(effect.is_disposed());
        assert!(rt.dependents_of(store.id(), "a").is_empty());

        store.set("a", 2);
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run(), Err(Error::Disposed(effect.id())));

        // Disposing again is harmless.
        effect.dispose().unwrap();
    }

    #[test]
    fn dispose_from_inside_the_body_is_rejected() {
        let rt = Runtime::new();
        let outcome = Rc::new(Cell::new(None));
        let handle: Rc<RefCell<Option<Effect<()>>>> = Rc::new(RefCell::new(None));

        let effect = {
            let outcome = Rc::clone(&outcome);
            let handle = Rc::clone(&handle);
            Effect::lazy(&rt, move || {
                if let Some(effect) = handle.borrow().as_ref() {
                    outcome.set(Some(effect.dispose()));
                }
            })
        };
        *handle.borrow_mut() = Some(effect.clone());

        effect.run().unwrap();
        assert_eq!(
            outcome.get(),
            Some(Err(Error::DisposeWhileRunning(effect.id())))
        );
        assert!(!effect.is_disposed());
    }

    #[test]
    fn nested_effects_attribute_reads_to_the_right_frame() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("outer", 1), ("inner", 2)]);

        let inner = {
            let store = store.clone();
            Effect::lazy(&rt, move || {
                store.get("inner");
            })
        };
        let outer = {
            let store = store.clone();
            let inner = inner.clone();
            Effect::new(&rt, move || {
                inner.run().unwrap();
                store.get("outer");
            })
        };

        assert!(inner.depends_on(store.id(), "inner"));
        assert!(!inner.depends_on(store.id(), "outer"));
        assert!(outer.depends_on(store.id(), "outer"));
        assert!(!outer.depends_on(store.id(), "inner"));
    }

    #[test]
    fn dependents_are_notified_in_read_order() {
        let rt = Runtime::new();
        let store = Store::wrap(&rt, [("a", 0)]);
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let make = |name: &'static str| {
            let store = store.clone();
            let order = Rc::clone(&order);
            Effect::new(&rt, move || {
                store.get("a");
                order.borrow_mut().push(name);
            })
        };
        let _first = make("first");
        let _second = make("second");
        let _third = make("third");
        order.borrow_mut().clear();

        store.set("a", 1);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }
}
