//! Fine-grained reactive dependency tracking.
//!
//! Values live in [`Store`]s, field maps whose reads and writes are
//! intercepted. A computation ([`Effect`]) that reads a field while
//! running records a dependency edge; writing that field later re-runs
//! exactly the computations that read it. Edges are rebuilt from scratch
//! on every run, so a body with conditional reads tracks only the branch
//! it last took.
//!
//! # How It Works
//!
//! 1. A [`Runtime`] owns the dependency graph and a stack of currently
//!    running computations. Reads attribute to the top of the stack.
//! 2. [`Effect`]s re-run synchronously when a dependency changes, or hand
//!    the re-run to a [`Scheduler`] such as an [`EffectQueue`], which
//!    deduplicates a burst of writes into one job per computation.
//! 3. [`Computed`] cells memoize a derived value and re-evaluate only
//!    when a dependency changed since the last read.
//!
//! ```
//! use weft_core::{Computed, Effect, Runtime, Store};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//! let store = Store::wrap(&rt, [("a", 1), ("b", 2)]);
//!
//! let sum = {
//!     let store = store.clone();
//!     Computed::new(&rt, move || {
//!         store.get("a").unwrap_or(0) + store.get("b").unwrap_or(0)
//!     })
//! };
//! assert_eq!(sum.get(), 3);
//!
//! let seen = Rc::new(Cell::new(0));
//! let _watcher = {
//!     let sum = sum.clone();
//!     let seen = Rc::clone(&seen);
//!     Effect::new(&rt, move || seen.set(sum.get()))
//! };
//! assert_eq!(seen.get(), 3);
//!
//! store.set("a", 10);
//! assert_eq!(seen.get(), 12);
//! ```

mod computed;
mod context;
mod deps;
mod effect;
mod error;
mod id;
mod queue;
mod runtime;
mod store;

pub use computed::Computed;
pub use effect::{Effect, EffectOptions, Rerun, Scheduler};
pub use error::{Error, Result};
pub use id::{ComputationId, StoreId};
pub use queue::EffectQueue;
pub use runtime::Runtime;
pub use store::Store;
