//! Error types for the reactive engine.
//!
//! Most of the engine is deliberately infallible: reads outside a
//! computation are silently untracked, writes to unobserved fields trigger
//! nothing, and a panic inside a computation body propagates to whoever
//! started the run. The errors here cover the two operations that can
//! genuinely fail: running a computation that no longer exists, and
//! disposing a computation from inside its own run.

use crate::id::ComputationId;
use thiserror::Error;

/// Result type alias for reactive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by operations on computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The computation was disposed and cannot run again.
    #[error("{0} has been disposed")]
    Disposed(ComputationId),

    /// Disposal was requested while the computation is on the active stack.
    /// Removing a running frame would corrupt dependency attribution.
    #[error("{0} cannot be disposed while it is running")]
    DisposeWhileRunning(ComputationId),
}
