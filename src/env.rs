//! Environment-layer contracts.
//!
//! The collector never looks inside an environment; it consumes the two
//! traits below. `Env` is one simulator; `VectorEnv` is the batched layer the
//! orchestration loop actually drives. Any parallelism (threads, processes,
//! remote workers) lives behind `VectorEnv` and is invisible here beyond the
//! synchronous-vs-asynchronous step contract.

use crate::core::{Info, RenderFrame};
use crate::record::Value;
use crate::rng::split_n;
use crate::spaces::ActionSpace;

/// One simulator step's outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvStep {
    pub obs: Value,
    /// Scalar or vector reward; dimensionality is preserved end to end.
    pub reward: Value,
    pub terminated: bool,
    pub truncated: bool,
    pub info: Info,
}

impl EnvStep {
    pub fn new(obs: Value, reward: Value, terminated: bool, truncated: bool, info: Info) -> Self {
        Self { obs, reward, terminated, truncated, info }
    }

    /// Whether this step ends the episode.
    pub fn done(&self) -> bool { self.terminated || self.truncated }
}

/// A single simulated environment.
pub trait Env {
    /// Reset to an initial state. Implementations should re-seed internal
    /// RNGs when `seed` is provided.
    fn reset(&mut self, seed: Option<u64>) -> (Value, Info);

    /// Apply an action and advance by one step.
    fn step(&mut self, action: &Value) -> EnvStep;

    /// Description of this environment's action set.
    fn action_space(&self) -> ActionSpace;

    /// Render a frame of the current state, if supported.
    fn render(&self) -> Option<RenderFrame> { None }

    /// Release any external resources.
    fn close(&mut self) {}
}

/// A step outcome tagged with the global slot it belongs to. Asynchronous
/// layers report completions out of order, so the tag is what keeps episode
/// caches and hidden state attached to the right slot.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorStep {
    pub env_id: usize,
    pub step: EnvStep,
}

/// The batched environment layer the collector drives.
pub trait VectorEnv {
    /// Number of environment slots.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }

    /// Whether `step` reports completions out of order. Synchronous layers
    /// return `false`.
    fn is_async(&self) -> bool { false }

    /// Reset the given slots (all slots when `ids` is `None`); observations
    /// come back in `ids` order.
    fn reset(&mut self, ids: Option<&[usize]>) -> Vec<Value>;

    /// Step the given slots (all slots, in index order, when `ids` is
    /// `None`) with one action per slot. Synchronous layers return exactly
    /// the slots stepped; asynchronous layers return whichever slots
    /// finished first, which may differ from the set just stepped.
    fn step(&mut self, actions: &[Value], ids: Option<&[usize]>) -> Vec<VectorStep>;

    /// Re-seed every slot from a root seed (or clear seeding with `None`).
    fn seed(&mut self, seed: Option<u64>);

    /// The action set of one slot.
    fn action_space(&self, index: usize) -> ActionSpace;

    /// Render all slots. A pure side effect.
    fn render(&mut self);

    /// Close all slots.
    fn close(&mut self);
}

/// Runs N copies of an environment in the current thread.
///
/// The reference synchronous implementation: stepping is a plain loop, and
/// `step` always reports the stepped slots back in order. Per-slot seeds are
/// derived by splitting the root seed and applied on the next reset.
pub struct SyncVectorEnv<E: Env> {
    envs: Vec<E>,
    pending_seeds: Vec<Option<u64>>,
}

impl<E: Env> SyncVectorEnv<E> {
    /// Create N copies using the provided factory closure.
    pub fn new<F>(n: usize, mut factory: F) -> Self
    where
        F: FnMut() -> E,
    {
        let envs = (0..n).map(|_| factory()).collect();
        Self { envs, pending_seeds: vec![None; n] }
    }

    /// Immutable access to the underlying envs (advanced usage).
    pub fn envs(&self) -> &[E] { &self.envs }

    /// Mutable access to the underlying envs (advanced usage).
    pub fn envs_mut(&mut self) -> &mut [E] { &mut self.envs }
}

impl<E: Env> VectorEnv for SyncVectorEnv<E> {
    fn len(&self) -> usize { self.envs.len() }

    fn reset(&mut self, ids: Option<&[usize]>) -> Vec<Value> {
        let ids: Vec<usize> = match ids {
            Some(ids) => ids.to_vec(),
            None => (0..self.envs.len()).collect(),
        };
        ids.into_iter()
            .map(|i| {
                let seed = self.pending_seeds[i].take();
                self.envs[i].reset(seed).0
            })
            .collect()
    }

    fn step(&mut self, actions: &[Value], ids: Option<&[usize]>) -> Vec<VectorStep> {
        let ids: Vec<usize> = match ids {
            Some(ids) => ids.to_vec(),
            None => (0..self.envs.len()).collect(),
        };
        assert_eq!(actions.len(), ids.len(), "one action per stepped slot");
        ids.into_iter()
            .zip(actions)
            .map(|(i, action)| VectorStep { env_id: i, step: self.envs[i].step(action) })
            .collect()
    }

    fn seed(&mut self, seed: Option<u64>) {
        self.pending_seeds = match seed {
            Some(root) => split_n(root, self.envs.len()).into_iter().map(Some).collect(),
            None => vec![None; self.envs.len()],
        };
    }

    fn action_space(&self, index: usize) -> ActionSpace {
        self.envs[index].action_space()
    }

    fn render(&mut self) {
        for env in &self.envs {
            let _ = env.render();
        }
    }

    fn close(&mut self) {
        for env in &mut self.envs {
            env.close();
        }
    }
}
