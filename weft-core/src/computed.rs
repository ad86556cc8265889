//! Computed cells: memoized derived values.
//!
//! # How It Works
//!
//! 1. The getter runs inside a lazy [`Effect`], so reads against stores
//!    record edges to it like any other computation.
//! 2. The effect carries a scheduler that, instead of re-running the
//!    getter, marks the cell dirty and triggers the cell's own synthetic
//!    `"value"` field. Dependents of the cell re-run; the getter does not.
//! 3. [`Computed::get`] re-evaluates only when dirty, caches the result,
//!    and tracks the `"value"` field so the caller becomes a dependent.
//!
//! The dirty guard also batches: several upstream writes between reads
//! mark the cell dirty once and cost one getter evaluation at the next
//! read.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::effect::{Effect, EffectOptions, Scheduler};
use crate::id::StoreId;
use crate::runtime::Runtime;

/// The synthetic field a computed cell tracks and triggers under.
const VALUE_FIELD: &str = "value";

/// A memoized derived value. Clones share the same cell.
pub struct Computed<T: Clone + 'static> {
    inner: Rc<ComputedInner<T>>,
}

struct ComputedInner<T: Clone + 'static> {
    runtime: Runtime,
    /// Synthetic store id the cell tracks and triggers under; no field
    /// map backs it.
    cell: StoreId,
    effect: Effect<T>,
    dirty: Rc<Cell<bool>>,
    cached: RefCell<Option<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    /// Wraps `getter` in a cell that evaluates lazily and memoizes.
    pub fn new<F>(runtime: &Runtime, getter: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let cell = runtime.allocate_store();
        let dirty = Rc::new(Cell::new(true));

        // Weakly captured so the scheduler, stored in the runtime's own
        // arena, does not keep the runtime alive through a cycle.
        let scheduler: Scheduler = {
            let state = runtime.downgrade();
            let dirty = Rc::clone(&dirty);
            Rc::new(move |_rerun| {
                if dirty.get() {
                    return;
                }
                dirty.set(true);
                if let Some(state) = state.upgrade() {
                    Runtime::from_state(state).trigger(cell, VALUE_FIELD);
                }
            })
        };
        let effect = Effect::with_options(
            runtime,
            getter,
            EffectOptions {
                scheduler: Some(scheduler),
                lazy: true,
            },
        );

        Self {
            inner: Rc::new(ComputedInner {
                runtime: runtime.clone(),
                cell,
                effect,
                dirty,
                cached: RefCell::new(None),
            }),
        }
    }

    /// Returns the derived value, evaluating the getter only when a
    /// dependency changed since the last read. Inside a computation, the
    /// read also subscribes the caller to this cell.
    pub fn get(&self) -> T {
        if self.inner.dirty.get() {
            trace!(cell = %self.inner.cell, "computed revalidate");
            let value = self
                .inner
                .effect
                .run()
                .expect("a computed cell owns its effect");
            *self.inner.cached.borrow_mut() = Some(value);
            self.inner.dirty.set(false);
        }
        self.inner.runtime.track(self.inner.cell, VALUE_FIELD);
        self.inner
            .cached
            .borrow()
            .clone()
            .expect("a clean cell has a cached value")
    }

    /// Whether the next [`get`](Self::get) will re-evaluate.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Marks the cell dirty and notifies dependents, as if a dependency had
    /// changed. The next [`get`](Self::get) re-evaluates the getter.
    pub fn invalidate(&self) {
        if self.inner.dirty.get() {
            return;
        }
        self.inner.dirty.set(true);
        self.inner.runtime.trigger(self.inner.cell, VALUE_FIELD);
    }

    /// The synthetic store id dependents subscribe under.
    pub fn id(&self) -> StoreId {
        self.inner.cell
    }

    /// Completed getter evaluations.
    pub fn getter_runs(&self) -> u64 {
        self.inner.effect.run_count()
    }
}

impl<T: Clone + 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("cell", &self.inner.cell)
            .field("dirty", &self.inner.dirty.get())
            .field("cached", &*self.inner.cached.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        let _ = self.effect.dispose();
        self.runtime.release_store(self.cell);
    }
}
