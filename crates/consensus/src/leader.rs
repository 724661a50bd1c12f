//! Deterministic leader election: a permutation of committee indices
//! reseeded from the current state hash on every state transition.

use covenant_primitives::prelude::Buf32;
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Builds the peer permutation for a given committee size, seeded from the
/// state hash so every honest replica computes the identical ordering.
pub fn permutation_for(state_hash: &Buf32, committee_size: usize) -> Vec<usize> {
    let mut rng = ChaCha8Rng::from_seed(*state_hash.as_bytes());
    let mut indices: Vec<usize> = (0..committee_size).collect();
    indices.shuffle(&mut rng);
    indices
}

/// The leader of state index `n`: `permutation[n mod committee_size]`.
pub fn leader_index(permutation: &[usize], state_index: u64) -> usize {
    permutation[(state_index as usize) % permutation.len()]
}
