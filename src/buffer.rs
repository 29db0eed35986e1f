//! Permanent-buffer contract and an in-memory reference implementation.
//!
//! The collector mutates a buffer only through `extend`, one complete episode
//! at a time; `sample` is the only read path. Persistence and eviction
//! policies belong to downstream implementations.

use rand::{Rng, SeedableRng};

use crate::cache::EpisodeCache;
use crate::record::Record;
use crate::rng::RngStream;

/// Storage for completed transitions.
pub trait ReplayBuffer {
    /// Append one transition (a record of length-one columns).
    fn push(&mut self, transition: &Record);

    /// Flush a complete episode, oldest transition first. This is the only
    /// write path the collector uses.
    fn extend(&mut self, episode: &EpisodeCache) {
        for transition in episode.steps() {
            self.push(transition);
        }
    }

    /// Draw a batch and the indices it came from. `batch_size == 0` returns
    /// the entire contents in storage order.
    fn sample(&mut self, batch_size: usize) -> (Record, Vec<usize>);

    /// Drop all stored transitions.
    fn reset(&mut self);

    /// Number of stored transitions.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Unbounded in-memory list buffer.
///
/// Keeps whole transitions as rows; sampling is uniform with replacement
/// over a deterministic stream when seeded. Suitable for tests, evaluation
/// runs and small on-policy workloads.
pub struct MemoryBuffer {
    rows: Vec<Record>,
    rng: RngStream,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self { rows: Vec::new(), rng: RngStream::from_entropy() }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self { rows: Vec::new(), rng: RngStream::seed_from_u64(seed) }
    }

    /// The stored transitions, oldest first.
    pub fn rows(&self) -> &[Record] { &self.rows }
}

impl Default for MemoryBuffer {
    fn default() -> Self { Self::new() }
}

impl ReplayBuffer for MemoryBuffer {
    fn push(&mut self, transition: &Record) {
        self.rows.push(transition.clone());
    }

    fn sample(&mut self, batch_size: usize) -> (Record, Vec<usize>) {
        if batch_size == 0 || self.rows.is_empty() {
            let indices: Vec<usize> = (0..self.rows.len()).collect();
            return (Record::stack(self.rows.iter()), indices);
        }
        let indices: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.gen_range(0..self.rows.len()))
            .collect();
        let batch = Record::stack(indices.iter().map(|&i| &self.rows[i]));
        (batch, indices)
    }

    fn reset(&mut self) {
        self.rows.clear();
    }

    fn len(&self) -> usize { self.rows.len() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Column, Value};

    fn row(x: f32) -> Record {
        let mut r = Record::new();
        r.set("obs", Column::Values(vec![Value::Float(x)]));
        r
    }

    fn episode(rewards: &[f32]) -> EpisodeCache {
        let mut cache = EpisodeCache::new();
        for &x in rewards {
            cache.add(row(x));
        }
        cache
    }

    #[test]
    fn extend_keeps_episode_order() {
        let mut buffer = MemoryBuffer::with_seed(0);
        buffer.extend(&episode(&[1.0, 2.0, 3.0]));
        assert_eq!(buffer.len(), 3);
        let (all, indices) = buffer.sample(0);
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(
            all.column("obs"),
            &Column::Values(vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)])
        );
    }

    #[test]
    fn sized_sample_draws_that_many() {
        let mut buffer = MemoryBuffer::with_seed(1);
        buffer.extend(&episode(&[1.0, 2.0]));
        let (batch, indices) = buffer.sample(5);
        assert_eq!(indices.len(), 5);
        assert_eq!(batch.column("obs").len(), 5);
        assert!(indices.iter().all(|&i| i < 2));
    }

    #[test]
    fn reset_empties_storage() {
        let mut buffer = MemoryBuffer::with_seed(2);
        buffer.extend(&episode(&[1.0]));
        buffer.reset();
        assert!(buffer.is_empty());
        let (all, indices) = buffer.sample(0);
        assert!(indices.is_empty());
        assert!(all.is_empty());
    }
}
