//! Ready-set tracking.
//!
//! The ordered set of environment slots participating in the next step.
//! Synchronous layers keep the identity sequence; asynchronous layers replace
//! the membership every iteration with the slots that just reported back.
//! Everything positional in the working record is keyed by this ordering, so
//! (position, global index) pairs always come from here.

/// The environment slots participating in the next orchestration step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadySet {
    ids: Vec<usize>,
}

impl ReadySet {
    /// The identity sequence `[0, n)`, used by synchronous layers and after
    /// every full reset.
    pub fn full(n: usize) -> Self {
        Self { ids: (0..n).collect() }
    }

    /// Replace the membership with the slots the environment layer reported
    /// as finished, in the order they were reported.
    pub fn replace(&mut self, ids: Vec<usize>) {
        self.ids = ids;
    }

    /// Global slot indices, in ready order.
    pub fn ids(&self) -> &[usize] { &self.ids }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Iterate `(position, global index)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.ids.iter().copied().enumerate()
    }
}
