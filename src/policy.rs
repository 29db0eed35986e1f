//! Policy-side contracts.
//!
//! The collector treats the policy as a callable producing actions, optional
//! recurrent state and optional auxiliary outputs. `process_fn` is consumed
//! only by the sampling hand-off, never by the collection loop itself.

use crate::buffer::ReplayBuffer;
use crate::record::{Hidden, Record, Value};

/// What a policy returns for one batch of ready environments.
///
/// `act`, and `state` when present, hold one entry per ready position, in
/// ready order. `policy` carries auxiliary outputs (log-probs, value
/// estimates, ...) that should travel with the transition into storage.
#[derive(Clone, Debug, Default)]
pub struct PolicyOutput {
    pub act: Vec<Value>,
    pub state: Option<Vec<Hidden>>,
    pub policy: Option<Record>,
}

/// The decision-making agent driven by the collector.
pub trait Policy {
    /// Compute actions for the working record. `state` is the previous
    /// hidden state for each ready position, or `None` when no position has
    /// been stepped yet.
    fn forward(&mut self, batch: &Record, state: Option<&[Hidden]>) -> PolicyOutput;

    /// Post-process a sampled batch before it is handed to the learner
    /// (e.g., return computation). Identity by default.
    fn process_fn(&self, batch: Record, _buffer: &dyn ReplayBuffer, _indices: &[usize]) -> Record {
        batch
    }
}

/// Additive exploration noise for continuous actions.
///
/// `sample(len)` returns one noise vector of the requested width; the
/// collector adds it to the action in place. Integer actions are never
/// perturbed.
pub trait ActionNoise {
    fn sample(&mut self, len: usize) -> Vec<f32>;

    /// Clear internal state (e.g., for temporally correlated noise).
    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Column;

    struct FixedPolicy;

    impl Policy for FixedPolicy {
        fn forward(&mut self, batch: &Record, _state: Option<&[Hidden]>) -> PolicyOutput {
            let n = batch.column("obs").len();
            PolicyOutput { act: vec![Value::Int(0); n], state: None, policy: None }
        }
    }

    #[test]
    fn default_process_fn_is_identity() {
        use crate::buffer::MemoryBuffer;
        let policy = FixedPolicy;
        let mut batch = Record::new();
        batch.set("rew", Column::Values(vec![Value::Float(1.0)]));
        let buffer = MemoryBuffer::new();
        let out = policy.process_fn(batch.clone(), &buffer, &[0]);
        assert_eq!(out, batch);
    }
}
