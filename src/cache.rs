//! Per-environment episode caches.
//!
//! One cache per environment slot accumulates the episode currently in
//! progress there. Nothing leaves a cache except through the collector's
//! explicit flush, which is what guarantees the permanent buffer only ever
//! sees complete episodes.

use crate::core::RecordError;
use crate::record::{Column, Record, Value};

/// An append-only buffer of transitions for one open episode.
#[derive(Clone, Debug, Default)]
pub struct EpisodeCache {
    steps: Vec<Record>,
}

impl EpisodeCache {
    pub fn new() -> Self { Self { steps: Vec::new() } }

    /// Append one transition (a record of length-one columns).
    pub fn add(&mut self, transition: Record) {
        self.steps.push(transition);
    }

    /// Steps accumulated since this slot's last reset.
    pub fn len(&self) -> usize { self.steps.len() }

    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    /// The cached transitions, oldest first.
    pub fn steps(&self) -> &[Record] { &self.steps }

    /// Clear the cache. Called after every flush and on discard.
    pub fn reset(&mut self) {
        self.steps.clear();
    }

    /// Sum of the `rew` field across all cached steps. Multi-dimensional
    /// rewards are summed element-wise, preserving dimensionality for later
    /// scalarization. `None` when no step carried a reward.
    pub fn total_reward(&self) -> Result<Option<Value>, RecordError> {
        let mut total: Option<Value> = None;
        for step in &self.steps {
            let Some(Column::Values(values)) = step.get("rew") else { continue };
            for value in values {
                match &mut total {
                    None => total = Some(value.clone()),
                    Some(t) => t.add_assign(value).map_err(|(expected, found)| {
                        RecordError::KindMismatch { key: "rew".into(), expected, found }
                    })?,
                }
            }
        }
        Ok(total)
    }
}
