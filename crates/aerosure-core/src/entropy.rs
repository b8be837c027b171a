//! Injectable randomness for oracle index assignment.
//!
//! The contract: a draw returns a value in `[0, span)` that callers who have
//! not yet been assigned it cannot predict. Production uses a hash of hidden
//! seed material and an incrementing counter; tests substitute a seeded
//! source so assignments are reproducible.

use crate::types::Principal;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of reporter-index randomness.
pub trait EntropySource {
    /// Draw one index in `[0, span)` for the given caller.
    fn draw(&mut self, caller: &Principal, span: u8) -> u8;
}

/// Default source: blake3 over a hidden seed, a wrapping counter, and the
/// caller identity.
///
/// The counter wraps after 250 draws, at which point the seed is refreshed
/// so the sequence never repeats for a patient observer.
#[derive(Debug, Clone)]
pub struct HashEntropy {
    seed: [u8; 32],
    nonce: u8,
}

impl HashEntropy {
    pub fn new() -> Self {
        Self {
            seed: rand::random(),
            nonce: 0,
        }
    }

    /// Fixed-seed constructor for simulation environments.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self { seed, nonce: 0 }
    }
}

impl Default for HashEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for HashEntropy {
    fn draw(&mut self, caller: &Principal, span: u8) -> u8 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed);
        hasher.update(&[self.nonce]);
        hasher.update(caller.as_str().as_bytes());
        let digest = hasher.finalize();

        if self.nonce > 250 {
            self.nonce = 0;
            self.seed = rand::random();
        } else {
            self.nonce += 1;
        }

        digest.as_bytes()[0] % span.max(1)
    }
}

/// Deterministic seeded source for tests.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    rng: StdRng,
}

impl SeededEntropy {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl EntropySource for SeededEntropy {
    fn draw(&mut self, _caller: &Principal, span: u8) -> u8 {
        self.rng.gen_range(0..span.max(1))
    }
}
