use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed offsets isolating the stochastic stages from one another. A pattern
/// seeded with `s` draws its grating parameters from `s + 2000`, its block
/// field from `s + 0` and its chromatic perturbation from `s + 1000`.
pub const GRATING_OFFSET: i64 = 2000;
pub const BLOCK_OFFSET: i64 = 0;
pub const PERTURBATION_OFFSET: i64 = 1000;

/// Deterministic value stream for one synthesis stage.
///
/// The stream is fully determined by `(seed, offset)`; verification never
/// replays synthesis, so reproducibility is only required across runs of
/// this implementation, not across implementations.
pub struct SeedStream {
    rng: ChaCha8Rng,
}

impl SeedStream {
    pub fn new(seed: i32, offset: i64) -> Self {
        let state = (seed as i64).wrapping_add(offset) as u64;
        Self {
            rng: ChaCha8Rng::seed_from_u64(state),
        }
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Uniform float in `[lo, hi)`.
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_unit()
    }

    /// Uniform signed integer in `[lo, hi)`.
    pub fn next_int(&mut self, lo: i32, hi: i32) -> i32 {
        self.rng.random_range(lo..hi)
    }

    /// Uniform byte in `[0, 256)`.
    pub fn next_byte(&mut self) -> u8 {
        self.rng.random::<u8>()
    }
}

/// Fresh nondeterministic seed for `synthesize(None)`, uniform in `[0, 2^31)`.
pub fn random_seed() -> i32 {
    rand::rng().random_range(0..i32::MAX)
}
