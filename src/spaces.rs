//! Action-space descriptions.
//!
//! Random-action collection samples directly from these instead of querying
//! the policy, so each environment slot must expose an independently
//! sampleable description of its action set.

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::record::Value;

/// One environment's action set.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionSpace {
    /// Integers in `[0, n)`.
    Discrete(u32),
    /// Fixed-length 0/1 vectors.
    MultiBinary(usize),
    /// Per-dimension inclusive bounds over continuous vectors.
    Box { low: Vec<f32>, high: Vec<f32> },
}

impl ActionSpace {
    /// Draw an independent uniform sample.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            ActionSpace::Discrete(n) => {
                let v = if *n <= 1 { 0 } else { Uniform::from(0..*n).sample(rng) };
                Value::Int(v as i64)
            }
            ActionSpace::MultiBinary(n) => Value::FloatVec(
                (0..*n).map(|_| if rng.gen_bool(0.5) { 1.0 } else { 0.0 }).collect(),
            ),
            ActionSpace::Box { low, high } => Value::FloatVec(
                low.iter()
                    .zip(high)
                    .map(|(&l, &h)| {
                        if l < h { Uniform::new_inclusive(l, h).sample(rng) } else { l }
                    })
                    .collect(),
            ),
        }
    }

    /// Whether the value is a member of this space.
    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (ActionSpace::Discrete(n), Value::Int(v)) => (0..i64::from(*n)).contains(v),
            (ActionSpace::MultiBinary(n), Value::FloatVec(v)) => {
                v.len() == *n && v.iter().all(|&x| x == 0.0 || x == 1.0)
            }
            (ActionSpace::Box { low, high }, Value::FloatVec(v)) => {
                v.len() == low.len()
                    && v.iter()
                        .zip(low.iter().zip(high))
                        .all(|(&x, (&l, &h))| l <= x && x <= h)
            }
            _ => false,
        }
    }
}
