//! Identifier types for the reactive engine.
//!
//! Stores and computations are addressed by opaque numeric handles allocated
//! by their [`Runtime`](crate::Runtime). The dependency graph stores handles
//! instead of references, which keeps it free of ownership cycles: a forward
//! set never keeps a computation alive, and the graph never keeps a store
//! alive.

use std::fmt;

/// Unique identifier for a tracked store within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) u64);

/// Unique identifier for a computation within a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(pub(crate) u64);

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "computation#{}", self.0)
    }
}
