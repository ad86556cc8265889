//! Forward dependency index.
//!
//! Maps `(store, field)` pairs to the ordered set of computations that read
//! the field on their most recent run. This is pure storage with no policy:
//! reads add entries (through [`Runtime::track`](crate::Runtime)), effect
//! cleanup removes them, and nothing else mutates the sets.
//!
//! The outer map is keyed by [`StoreId`] rather than by the store itself, so
//! the index never owns store data. When the last handle to a store drops,
//! its slice of the index is removed via [`DepGraph::drop_store`].

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::id::{ComputationId, StoreId};

/// A `(store, field)` coordinate. Each computation keeps the coordinates it
/// was recorded under in its back-index, so its next run can remove exactly
/// the edges the previous run created.
pub(crate) type DepKey = (StoreId, String);

/// Forward index: store -> field -> dependent computations in insertion
/// order. Insertion order is the notification order for a field.
#[derive(Debug, Default)]
pub(crate) struct DepGraph {
    stores: HashMap<StoreId, IndexMap<String, IndexSet<ComputationId>>>,
}

impl DepGraph {
    /// Adds `comp` to the forward set for `(store, field)`, creating the
    /// nested levels on demand. Returns false if the edge already existed.
    pub(crate) fn record(&mut self, store: StoreId, field: &str, comp: ComputationId) -> bool {
        self.stores
            .entry(store)
            .or_default()
            .entry(field.to_owned())
            .or_default()
            .insert(comp)
    }

    /// Ordered copy of the dependents of `(store, field)`.
    ///
    /// Triggers iterate a copy, never the live set: a dependent's re-run
    /// mutates the set through cleanup, and may write the same field again.
    pub(crate) fn snapshot(&self, store: StoreId, field: &str) -> SmallVec<[ComputationId; 4]> {
        self.stores
            .get(&store)
            .and_then(|fields| fields.get(field))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Removes one edge, preserving the insertion order of the remaining
    /// dependents.
    pub(crate) fn remove(&mut self, store: StoreId, field: &str, comp: ComputationId) {
        if let Some(fields) = self.stores.get_mut(&store) {
            if let Some(set) = fields.get_mut(field) {
                set.shift_remove(&comp);
            }
        }
    }

    /// Drops every edge under `store`.
    pub(crate) fn drop_store(&mut self, store: StoreId) {
        self.stores.remove(&store);
    }

    /// Whether the edge currently exists.
    pub(crate) fn contains(&self, store: StoreId, field: &str, comp: ComputationId) -> bool {
        self.stores
            .get(&store)
            .and_then(|fields| fields.get(field))
            .map(|set| set.contains(&comp))
            .unwrap_or(false)
    }
}
