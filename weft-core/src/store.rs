//! Tracked stores.
//!
//! A `Store<T>` wraps a field map so that every read records a dependency
//! and every write notifies dependents. The store is the unit of identity in
//! the dependency graph: edges are keyed by `(StoreId, field)`, so two
//! stores with identical contents never share dependents.
//!
//! The runtime is held weakly. The dependency graph indexes stores by id and
//! never owns their data, and a store that outlives its runtime keeps
//! working as a plain map: reads stop recording, writes stop triggering.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::id::StoreId;
use crate::runtime::{Runtime, State};

/// A tracked field map. Clones share the same fields and identity.
pub struct Store<T: Clone + 'static> {
    inner: Rc<StoreInner<T>>,
}

struct StoreInner<T> {
    id: StoreId,
    state: Weak<RefCell<State>>,
    fields: RefCell<IndexMap<String, T>>,
}

impl<T: Clone + 'static> Store<T> {
    /// Creates an empty tracked store.
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                id: runtime.allocate_store(),
                state: runtime.downgrade(),
                fields: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Wraps existing field/value pairs in a tracked store.
    pub fn wrap<K, I>(runtime: &Runtime, fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, T)>,
    {
        let store = Self::new(runtime);
        {
            let mut map = store.inner.fields.borrow_mut();
            for (field, value) in fields {
                map.insert(field.into(), value);
            }
        }
        store
    }

    /// The store's identity in the dependency graph.
    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    fn runtime(&self) -> Option<Runtime> {
        self.inner.state.upgrade().map(Runtime::from_state)
    }

    /// Reads a field, recording the active computation as a dependent.
    ///
    /// A missing field still records: a computation that saw `None` depends
    /// on the field being created later.
    pub fn get(&self, field: &str) -> Option<T> {
        if let Some(runtime) = self.runtime() {
            runtime.track(self.inner.id, field);
        }
        self.inner.fields.borrow().get(field).cloned()
    }

    /// Reads a field without recording a dependency.
    pub fn get_untracked(&self, field: &str) -> Option<T> {
        self.inner.fields.borrow().get(field).cloned()
    }

    /// Writes a field, then notifies dependents. The field is created if it
    /// does not exist; with no dependents the write just lands.
    pub fn set(&self, field: &str, value: T) {
        self.inner.fields.borrow_mut().insert(field.to_owned(), value);
        if let Some(runtime) = self.runtime() {
            runtime.trigger(self.inner.id, field);
        }
    }

    /// Rewrites a field from its current value. The read side is untracked;
    /// `update` is a write operation.
    pub fn update<F>(&self, field: &str, f: F)
    where
        F: FnOnce(Option<T>) -> T,
    {
        let current = self.get_untracked(field);
        self.set(field, f(current));
    }

    /// Removes a field, notifying dependents of the removal.
    pub fn remove(&self, field: &str) -> Option<T> {
        let removed = self.inner.fields.borrow_mut().shift_remove(field);
        if removed.is_some() {
            if let Some(runtime) = self.runtime() {
                runtime.trigger(self.inner.id, field);
            }
        }
        removed
    }

    /// Whether the field exists. Tracked: a computation that branches on
    /// presence depends on the field.
    pub fn contains(&self, field: &str) -> bool {
        if let Some(runtime) = self.runtime() {
            runtime.track(self.inner.id, field);
        }
        self.inner.fields.borrow().contains_key(field)
    }

    /// Field names in insertion order. Untracked.
    pub fn fields(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }
}

impl<T: Clone + 'static> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + fmt::Debug + 'static> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("fields", &*self.inner.fields.borrow())
            .finish()
    }
}

impl<T> Drop for StoreInner<T> {
    fn drop(&mut self) {
        // Last handle gone: release this store's slice of the graph.
        if let Some(state) = self.state.upgrade() {
            state.borrow_mut().graph.drop_store(self.id);
        }
    }
}
