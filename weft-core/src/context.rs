//! Active-computation stack.
//!
//! Tracks which computation is currently executing so that store reads can
//! be attributed to it. Nested runs are supported: a computed cell evaluated
//! inside an outer effect pushes a second frame, and popping restores the
//! outer computation as the active one.
//!
//! The stack lives inside the runtime state rather than in a thread local.
//! An explicit runtime keeps nested and re-entrant behavior visible in tests
//! and lets independent runtimes coexist.

use crate::id::ComputationId;

/// Stack of currently executing computations. Empty stack means reads
/// record nothing.
#[derive(Debug, Default)]
pub(crate) struct ActiveStack {
    frames: Vec<ComputationId>,
}

impl ActiveStack {
    /// The computation reads should currently be attributed to, if any.
    pub(crate) fn current(&self) -> Option<ComputationId> {
        self.frames.last().copied()
    }

    pub(crate) fn push(&mut self, id: ComputationId) {
        self.frames.push(id);
    }

    /// Pops the top frame. Underflow is a push/pop pairing bug, not a
    /// recoverable condition.
    pub(crate) fn pop(&mut self) -> ComputationId {
        self.frames
            .pop()
            .expect("active-computation stack underflow")
    }

    /// Whether `id` is anywhere on the stack, not just on top.
    pub(crate) fn contains(&self, id: ComputationId) -> bool {
        self.frames.iter().any(|frame| *frame == id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stack_has_no_current() {
        let stack = ActiveStack::default();
        assert!(stack.is_empty());
        assert_eq!(stack.current(), None);
    }

    #[test]
    fn push_and_pop_restore_previous_frame() {
        let mut stack = ActiveStack::default();
        let outer = ComputationId(1);
        let inner = ComputationId(2);

        stack.push(outer);
        assert_eq!(stack.current(), Some(outer));

        stack.push(inner);
        assert_eq!(stack.current(), Some(inner));

        assert_eq!(stack.pop(), inner);
        assert_eq!(stack.current(), Some(outer));

        assert_eq!(stack.pop(), outer);
        assert_eq!(stack.current(), None);
    }

    #[test]
    fn contains_sees_buried_frames() {
        let mut stack = ActiveStack::default();
        stack.push(ComputationId(1));
        stack.push(ComputationId(2));

        assert!(stack.contains(ComputationId(1)));
        assert!(stack.contains(ComputationId(2)));
        assert!(!stack.contains(ComputationId(3)));
    }

    #[test]
    #[should_panic(expected = "active-computation stack underflow")]
    fn pop_on_empty_stack_panics() {
        let mut stack = ActiveStack::default();
        stack.pop();
    }
}
