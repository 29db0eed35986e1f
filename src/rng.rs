//! Deterministic seeding utilities.
//!
//! A root u64 seed is expanded into per-environment sub-seeds with a
//! SplitMix64 step, so a vectorized layer can be reseeded from a single
//! number without correlating its member streams.

use rand_chacha::ChaCha8Rng;

/// The deterministic PRNG stream used across the crate.
pub type RngStream = ChaCha8Rng;

/// Expands a root seed into a deterministic sequence of sub-seeds.
#[derive(Clone, Debug)]
pub struct SeedSequence {
    state: u64,
}

impl SeedSequence {
    pub fn new(seed: u64) -> Self { Self { state: seed } }

    /// The next sub-seed (one SplitMix64 step).
    pub fn next_subseed(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

/// Split a root seed into `n` sub-seeds.
pub fn split_n(seed: u64, n: usize) -> Vec<u64> {
    let mut seq = SeedSequence::new(seed);
    (0..n).map(|_| seq.next_subseed()).collect()
}
